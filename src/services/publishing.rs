use crate::database::PageRepository;
use crate::domain::{Page, PageContent, PageVersion};
use crate::error::{PageError, PageResult};
use crate::io::verify_relative_path;
use crate::services::{SaveCoordinatorHandle, now};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Page and version lifecycle: create, draft, publish, discard.
///
/// New pages and drafts are fresh records and are written directly. Anything that
/// changes an existing version is handed to the save coordinator.
pub struct PublishingService {
    repo: Arc<dyn PageRepository>,
    saves: SaveCoordinatorHandle,
}

impl PublishingService {
    pub fn new(repo: Arc<dyn PageRepository>, saves: SaveCoordinatorHandle) -> Self {
        Self { repo, saves }
    }

    pub async fn create_page(&self, label: &str, template: &str) -> PageResult<Page> {
        if label.trim().is_empty() {
            return Err(PageError::BadRequest("page label must not be empty".to_string()));
        }
        // reject names that could never resolve inside the templates directory
        verify_relative_path(Path::new(""), Path::new(template))
            .map_err(|e| PageError::BadRequest(format!("invalid template name: {}", e)))?;

        let page = Page {
            id: Uuid::new_v4(),
            label: label.trim().to_string(),
            template: template.to_string(),
            current_version_id: None,
        };
        self.repo.save_page(&page).await?;

        info!(page_id = %page.id, template = %page.template, "Created page");
        Ok(page)
    }

    pub async fn versions(&self, page_id: Uuid) -> PageResult<Vec<PageVersion>> {
        let page = self
            .repo
            .get_page(page_id)
            .await?
            .ok_or_else(|| PageError::page_not_found(page_id))?;

        Ok(self.repo.list_versions(page.id).await?)
    }

    /// New draft seeded from the page's current version, with fresh block ids.
    pub async fn create_draft(&self, page_id: Uuid) -> PageResult<PageVersion> {
        let page = self
            .repo
            .get_page(page_id)
            .await?
            .ok_or_else(|| PageError::page_not_found(page_id))?;

        let draft = match page.current_version_id {
            Some(current_id) => {
                let current = self
                    .repo
                    .find_version_by_id(current_id)
                    .await?
                    .ok_or_else(|| PageError::version_not_found(current_id))?;

                let contents = current
                    .contents
                    .iter()
                    .map(|content| PageContent::new(content.markup.clone(), content.assets.clone()))
                    .collect();

                PageVersion::draft(page.id, current.title, current.description, contents, now())
            }
            None => PageVersion::draft(page.id, page.label.clone(), None, Vec::new(), now()),
        };

        self.repo.save_version(&draft).await?;

        info!(page_id = %page.id, version_id = %draft.id, "Created draft");
        Ok(draft)
    }

    /// Finalizes the hash and makes the version the page's current one.
    pub async fn publish(&self, version_id: Uuid) -> PageResult<(Page, PageVersion)> {
        self.saves.publish(version_id).await
    }

    /// Removes a draft. Published versions are a `Conflict`.
    pub async fn discard(&self, version_id: Uuid) -> PageResult<Page> {
        self.saves.discard(version_id).await
    }
}
