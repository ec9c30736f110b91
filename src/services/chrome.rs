//! Headless Chrome backend for snapshots, via the `headless_chrome` crate.

use crate::error::CaptureError;
use crate::services::snapshot::{BrowserLauncher, BrowserSession, SnapshotOptions};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::sync::Arc;
use tracing::debug;

// keep Chrome quiet and the capture free of scrollbars
const CHROME_ARGS: [&str; 5] = [
    "--log-level=3",
    "--silent",
    "--disable-logging",
    "--hide-scrollbars",
    "--mute-audio",
];

pub struct ChromeLauncher;

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self, options: &SnapshotOptions) -> Result<Box<dyn BrowserSession>, CaptureError> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((options.viewport_width, options.viewport_height)))
            .args(CHROME_ARGS.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| CaptureError::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| CaptureError::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| CaptureError::Launch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(options.navigation_timeout);

        Ok(Box::new(ChromeSession {
            tab,
            _browser: browser,
        }))
    }
}

/// Owns one Chrome process. Dropping the `Browser` kills it.
pub struct ChromeSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| navigation_error(url, e))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| navigation_error(url, e))?;

        Ok(())
    }

    fn capture_png(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| CaptureError::Screenshot(e.to_string()))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!("Releasing headless browser");
    }
}

fn navigation_error(url: &str, err: anyhow::Error) -> CaptureError {
    if err.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        CaptureError::NavigationTimeout {
            url: url.to_string(),
        }
    } else {
        CaptureError::Navigation {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
