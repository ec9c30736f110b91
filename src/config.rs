use crate::services::SnapshotOptions;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct PageBuilderConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    // scheme://host:port the headless browser uses to reach this server
    pub public_base_url: String,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    // relative to static_dir
    pub editor_stylesheet: PathBuf,
    pub snapshot_viewport_width: u32,
    pub snapshot_viewport_height: u32,
    pub snapshot_navigation_timeout: Duration,
    pub save_queue_capacity: usize,
}

impl PageBuilderConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("Failed to determine DATABASE_URL from environment variables")?;

        let max_connections = parse_or("MAX_CONNECTIONS", 15);

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let templates_dir = PathBuf::from(
            std::env::var("TEMPLATES_DIR").unwrap_or_else(|_| "./resources/templates".to_string()),
        );

        let static_dir = PathBuf::from(
            std::env::var("STATIC_DIR").unwrap_or_else(|_| "./resources/static".to_string()),
        );

        let editor_stylesheet = PathBuf::from(
            std::env::var("EDITOR_STYLESHEET")
                .unwrap_or_else(|_| "styles/page-editor-frame.css".to_string()),
        );

        let defaults = SnapshotOptions::default();
        let snapshot_viewport_width = parse_or("SNAPSHOT_VIEWPORT_WIDTH", defaults.viewport_width);
        let snapshot_viewport_height =
            parse_or("SNAPSHOT_VIEWPORT_HEIGHT", defaults.viewport_height);

        // a zero timeout would fail every capture, so one second is the floor
        let timeout_secs: u64 = parse_or(
            "SNAPSHOT_NAVIGATION_TIMEOUT_SECS",
            defaults.navigation_timeout.as_secs(),
        );
        let snapshot_navigation_timeout = Duration::from_secs(timeout_secs.max(1));

        let save_queue_capacity = parse_or("SAVE_QUEUE_CAPACITY", 64);

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
            public_base_url,
            templates_dir,
            static_dir,
            editor_stylesheet,
            snapshot_viewport_width,
            snapshot_viewport_height,
            snapshot_navigation_timeout,
            save_queue_capacity,
        })
    }

    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            viewport_width: self.snapshot_viewport_width,
            viewport_height: self.snapshot_viewport_height,
            navigation_timeout: self.snapshot_navigation_timeout,
        }
    }

    /// Absolute URL of the hash-addressed preview of a version.
    pub fn preview_url(&self, hash: &str) -> String {
        format!("{}/pages/preview/{}", self.public_base_url, hash)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<T>().ok())
        .unwrap_or(default)
}
