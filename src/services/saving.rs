use crate::database::PageRepository;
use crate::domain::{Page, PageVersion, VersionEdit, VersionStatus};
use crate::error::{PageError, PageResult};
use crate::services::now;
use anyhow::anyhow;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// A write to an existing page version, queued for the coordinator.
pub enum VersionCommand {
    Save {
        version_id: Uuid,
        edit: VersionEdit,
        reply: oneshot::Sender<PageResult<PageVersion>>,
    },
    Publish {
        version_id: Uuid,
        reply: oneshot::Sender<PageResult<(Page, PageVersion)>>,
    },
    Discard {
        version_id: Uuid,
        reply: oneshot::Sender<PageResult<Page>>,
    },
}

/// Cheap to clone; every editor session holds one.
#[derive(Clone)]
pub struct SaveCoordinatorHandle {
    sender: mpsc::Sender<VersionCommand>,
}

impl SaveCoordinatorHandle {
    /// Queues an edit and waits for the coordinator to persist it.
    pub async fn save(&self, version_id: Uuid, edit: VersionEdit) -> PageResult<PageVersion> {
        let (reply, response) = oneshot::channel();
        self.submit(VersionCommand::Save {
            version_id,
            edit,
            reply,
        })
        .await?;
        receive(response).await
    }

    pub async fn publish(&self, version_id: Uuid) -> PageResult<(Page, PageVersion)> {
        let (reply, response) = oneshot::channel();
        self.submit(VersionCommand::Publish { version_id, reply })
            .await?;
        receive(response).await
    }

    pub async fn discard(&self, version_id: Uuid) -> PageResult<Page> {
        let (reply, response) = oneshot::channel();
        self.submit(VersionCommand::Discard { version_id, reply })
            .await?;
        receive(response).await
    }

    async fn submit(&self, command: VersionCommand) -> PageResult<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| PageError::Storage(anyhow!("save coordinator is not running")))
    }
}

async fn receive<T>(response: oneshot::Receiver<PageResult<T>>) -> PageResult<T> {
    response
        .await
        .map_err(|_| PageError::Storage(anyhow!("save coordinator dropped the request")))?
}

/// Owns every write to an existing version: edits, publication and discarding.
/// Commands are handled strictly one after another, so a version never has two
/// writes in flight and a slow save cannot overwrite a publish or resurrect a
/// discarded draft.
pub struct SaveCoordinator {
    repo: Arc<dyn PageRepository>,
    receiver: mpsc::Receiver<VersionCommand>,
}

impl SaveCoordinator {
    /// Starts the coordinator task. It stops once every handle is dropped.
    pub fn spawn(
        repo: Arc<dyn PageRepository>,
        capacity: usize,
    ) -> (SaveCoordinatorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let coordinator = SaveCoordinator { repo, receiver };
        let task = tokio::spawn(coordinator.run());

        (SaveCoordinatorHandle { sender }, task)
    }

    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            // the requester may have gone away in the meantime, hence the ignored sends
            match command {
                VersionCommand::Save {
                    version_id,
                    edit,
                    reply,
                } => {
                    let _ = reply.send(self.save(version_id, edit).await);
                }
                VersionCommand::Publish { version_id, reply } => {
                    let _ = reply.send(self.publish(version_id).await);
                }
                VersionCommand::Discard { version_id, reply } => {
                    let _ = reply.send(self.discard(version_id).await);
                }
            }
        }
        debug!("Save coordinator stopped");
    }

    async fn save(&self, version_id: Uuid, edit: VersionEdit) -> PageResult<PageVersion> {
        validate_edit(&edit)?;

        let mut version = self.load_version(version_id).await?;

        if version.is_published() {
            return Err(PageError::Conflict(format!(
                "page version {} is published and can no longer be edited",
                version_id
            )));
        }

        let previous_hash = version.hash.clone();
        version.apply(edit, now());
        self.repo.save_version(&version).await?;

        info!(
            version_id = %version.id,
            blocks = version.contents.len(),
            previous_hash = %previous_hash,
            hash = %version.hash,
            "Saved page version"
        );
        Ok(version)
    }

    // finalizes the hash and makes the version the page's current one
    async fn publish(&self, version_id: Uuid) -> PageResult<(Page, PageVersion)> {
        let mut version = self.load_version(version_id).await?;
        let mut page = self.load_page(version.page_id).await?;

        if page.current_version_id == Some(version.id) && version.is_published() {
            return Ok((page, version));
        }

        version.rehash();
        version.status = VersionStatus::Published;
        version.updated_at = now();
        page.current_version_id = Some(version.id);

        self.repo.commit_publication(&page, &version).await?;

        info!(page_id = %page.id, version_id = %version.id, hash = %version.hash, "Published page version");
        Ok((page, version))
    }

    // published versions stay, since pages and links may point at them
    async fn discard(&self, version_id: Uuid) -> PageResult<Page> {
        let version = self.load_version(version_id).await?;
        let page = self.load_page(version.page_id).await?;

        if version.is_published() || page.current_version_id == Some(version.id) {
            return Err(PageError::Conflict(format!(
                "page version {} is published and cannot be discarded",
                version.id
            )));
        }

        self.repo.delete_version(version.id).await?;

        info!(page_id = %page.id, version_id = %version.id, "Discarded draft");
        Ok(page)
    }

    async fn load_version(&self, version_id: Uuid) -> PageResult<PageVersion> {
        self.repo
            .find_version_by_id(version_id)
            .await?
            .ok_or_else(|| PageError::version_not_found(version_id))
    }

    async fn load_page(&self, page_id: Uuid) -> PageResult<Page> {
        self.repo
            .get_page(page_id)
            .await?
            .ok_or_else(|| PageError::page_not_found(page_id))
    }
}

fn validate_edit(edit: &VersionEdit) -> PageResult<()> {
    if edit.title.trim().is_empty() {
        return Err(PageError::BadRequest("title must not be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for content in &edit.contents {
        if !seen.insert(content.id) {
            return Err(PageError::BadRequest(format!(
                "content block {} appears more than once",
                content.id
            )));
        }
    }

    Ok(())
}
