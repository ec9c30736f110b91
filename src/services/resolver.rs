use crate::database::PageRepository;
use crate::domain::{ContentHash, PageVersion};
use crate::error::{PageError, PageResult};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Looks page versions up by their content hash or by their id.
pub struct HashResolver {
    repo: Arc<dyn PageRepository>,
}

impl HashResolver {
    pub fn new(repo: Arc<dyn PageRepository>) -> Self {
        Self { repo }
    }

    /// `BadRequest` for anything that is not a content hash, `NotFound` when no
    /// live version currently carries it.
    pub async fn resolve_by_hash(&self, raw: &str) -> PageResult<PageVersion> {
        let hash = ContentHash::parse(raw)
            .ok_or_else(|| PageError::BadRequest(format!("'{}' is not a valid content hash", raw)))?;

        let version = self
            .repo
            .find_version_by_hash(&hash)
            .await?
            .ok_or_else(|| PageError::version_not_found(&hash))?;

        if !version.has_current_hash() {
            // a stored hash that no longer describes the stored blocks must not be served
            warn!(version_id = %version.id, hash = %hash, "Stored hash is stale");
            return Err(PageError::version_not_found(&hash));
        }

        Ok(version)
    }

    pub async fn find_by_id(&self, id: Uuid) -> PageResult<PageVersion> {
        self.repo
            .find_version_by_id(id)
            .await?
            .ok_or_else(|| PageError::version_not_found(id))
    }

    /// Like [`find_by_id`](Self::find_by_id), but an unparsable id is simply not found.
    pub async fn find_by_raw_id(&self, raw: &str) -> PageResult<PageVersion> {
        let id = Uuid::parse_str(raw).map_err(|_| PageError::version_not_found(raw))?;
        self.find_by_id(id).await
    }
}
