use crate::error::{CaptureError, PageError, PageResult};
use crate::services::HashResolver;
use image::ImageFormat;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed browser setup used for every capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Upper bound on waiting for navigation to finish. Never zero.
    pub navigation_timeout: Duration,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 960,
            navigation_timeout: Duration::from_secs(15),
        }
    }
}

/// Starts isolated headless browsers.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, options: &SnapshotOptions) -> Result<Box<dyn BrowserSession>, CaptureError>;
}

/// One exclusively owned browser instance.
///
/// Implementations terminate the browser when dropped, so holding the session by
/// value is what keeps the process alive.
pub trait BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError>;
    fn capture_png(&mut self) -> Result<Vec<u8>, CaptureError>;
}

/// Captures PNG thumbnails of preview URLs.
pub struct SnapshotService {
    resolver: Arc<HashResolver>,
    launcher: Arc<dyn BrowserLauncher>,
    options: SnapshotOptions,
}

impl SnapshotService {
    pub fn new(
        resolver: Arc<HashResolver>,
        launcher: Arc<dyn BrowserLauncher>,
        mut options: SnapshotOptions,
    ) -> Self {
        if options.navigation_timeout.is_zero() {
            options.navigation_timeout = SnapshotOptions::default().navigation_timeout;
        }

        Self {
            resolver,
            launcher,
            options,
        }
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    /// Loads `preview_url` in a fresh headless browser and returns a PNG of the viewport.
    ///
    /// The hash embedded in the URL is resolved first; a URL that points at nothing
    /// is a capture failure rather than a missing page. A navigation timeout is
    /// retried once with a new browser.
    pub async fn capture_snapshot(&self, preview_url: &str) -> PageResult<Vec<u8>> {
        let hash = preview_hash(preview_url);

        match self.resolver.resolve_by_hash(hash).await {
            Ok(_) => {}
            Err(e @ (PageError::NotFound { .. } | PageError::BadRequest(_))) => {
                return Err(CaptureError::UnresolvedPreview {
                    url: preview_url.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e),
        }

        let launcher = Arc::clone(&self.launcher);
        let options = self.options.clone();
        let url = preview_url.to_string();

        // browser automation blocks, keep it off the async workers
        let png = tokio::task::spawn_blocking(move || {
            capture_with_retry(launcher.as_ref(), &options, &url)
        })
        .await
        .map_err(|e| CaptureError::Screenshot(format!("capture task failed: {}", e)))??;

        info!(url = %preview_url, bytes = png.len(), "Captured page snapshot");

        Ok(png)
    }
}

fn capture_with_retry(
    launcher: &dyn BrowserLauncher,
    options: &SnapshotOptions,
    url: &str,
) -> Result<Vec<u8>, CaptureError> {
    match capture_once(launcher, options, url) {
        Err(e) if e.is_transient() => {
            warn!(url = %url, error = %e, "Snapshot navigation timed out, retrying with a fresh browser");
            capture_once(launcher, options, url)
        }
        other => other,
    }
}

fn capture_once(
    launcher: &dyn BrowserLauncher,
    options: &SnapshotOptions,
    url: &str,
) -> Result<Vec<u8>, CaptureError> {
    // the session is released on every return below when it goes out of scope
    let mut session = launcher.launch(options)?;
    debug!(url = %url, "Headless browser launched");

    session.navigate(url)?;
    let png = session.capture_png()?;
    validate_png(&png)?;

    Ok(png)
}

fn validate_png(bytes: &[u8]) -> Result<(), CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::InvalidImage("no bytes captured".to_string()));
    }

    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(()),
        Ok(other) => Err(CaptureError::InvalidImage(format!(
            "expected PNG, got {:?}",
            other
        ))),
        Err(e) => Err(CaptureError::InvalidImage(e.to_string())),
    }
}

// the hash is the last path segment of a `/pages/preview/{hash}` URL
pub fn preview_hash(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
