use crate::domain::{ContentHash, Page, PageVersion};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod sqlite;

// shared between handlers and the save coordinator, so it must be Send + Sync.
// every `find_*` returns a version together with all of its contents, read as one snapshot.
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn get_page(&self, id: Uuid) -> Result<Option<Page>>;
    async fn find_version_by_id(&self, id: Uuid) -> Result<Option<PageVersion>>;
    // most recently updated version wins when several share the hash
    async fn find_version_by_hash(&self, hash: &ContentHash) -> Result<Option<PageVersion>>;
    async fn list_versions(&self, page_id: Uuid) -> Result<Vec<PageVersion>>;

    // write operations
    async fn save_page(&self, page: &Page) -> Result<()>;
    async fn save_version(&self, version: &PageVersion) -> Result<()>;
    // stores the version and the page that now points at it in one go
    async fn commit_publication(&self, page: &Page, version: &PageVersion) -> Result<()>;
    async fn delete_version(&self, id: Uuid) -> Result<()>;
}
