use thiserror::Error;
use uuid::Uuid;

pub type PageResult<T> = std::result::Result<T, PageError>;

/// Failures of the rendering and publishing pipeline.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to render page version {version_id}: {message}")]
    Rendering { version_id: Uuid, message: String },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl PageError {
    pub fn version_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "page version",
            key: key.to_string(),
        }
    }

    pub fn page_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "page",
            key: key.to_string(),
        }
    }
}

/// Headless browser failures. Kept apart from `NotFound` so that a broken
/// capture setup is never mistaken for a missing page.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to launch headless browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Preview URL {url} does not resolve to a page version: {reason}")]
    UnresolvedPreview { url: String, reason: String },

    #[error("Captured image is not a valid PNG: {0}")]
    InvalidImage(String),
}

impl CaptureError {
    /// Only navigation timeouts are worth another attempt with a fresh browser.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NavigationTimeout { .. })
    }
}
