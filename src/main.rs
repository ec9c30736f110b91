use crate::config::PageBuilderConfig;
use crate::database::PageRepository;
use crate::database::sqlite::SqliteRepository;
use crate::io::ResourceReader;
use crate::io::local::LocalResourceReader;
use crate::rendering::PageRenderer;
use crate::services::{
    BrowserLauncher, ChromeLauncher, HashResolver, PublishingService, SaveCoordinator,
    SaveCoordinatorHandle, SnapshotService,
};
use anyhow::Context;
use axum::Router;
use sqlx::Sqlite;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
mod database;
mod domain;
mod error;
mod features;
mod io;
mod rendering;
mod services;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<PageRenderer>,
    pub resolver: Arc<HashResolver>,
    pub snapshots: Arc<SnapshotService>,
    pub publishing: Arc<PublishingService>,
    pub saves: SaveCoordinatorHandle,
    pub config: Arc<PageBuilderConfig>,
}

impl AppState {
    /// Wires the pipeline together. Also starts the save coordinator, whose task
    /// ends once the last clone of the state is dropped.
    pub fn new(
        repo: Arc<dyn PageRepository>,
        templates: Arc<dyn ResourceReader>,
        statics: Arc<dyn ResourceReader>,
        launcher: Arc<dyn BrowserLauncher>,
        config: Arc<PageBuilderConfig>,
    ) -> (Self, JoinHandle<()>) {
        let resolver = Arc::new(HashResolver::new(repo.clone()));
        let renderer = Arc::new(PageRenderer::new(
            repo.clone(),
            templates,
            statics,
            config.editor_stylesheet.clone(),
        ));
        let snapshots = Arc::new(SnapshotService::new(
            resolver.clone(),
            launcher,
            config.snapshot_options(),
        ));
        let (saves, coordinator) = SaveCoordinator::spawn(repo.clone(), config.save_queue_capacity);
        let publishing = Arc::new(PublishingService::new(repo, saves.clone()));

        let state = AppState {
            renderer,
            resolver,
            snapshots,
            publishing,
            saves,
            config,
        };

        (state, coordinator)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // determine environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_builder=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PageBuilderConfig::from_env()?;
    let shared_config = Arc::new(config.clone());

    // verify db exists
    if !Sqlite::database_exists(&config.database_url)
        .await
        .unwrap_or(false)
    {
        tracing::info!(url = %config.database_url, "Database missing, creating");
        Sqlite::create_database(&config.database_url)
            .await
            .with_context(|| format!("Unable to create database at {}", config.database_url))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to create pool on {}", config.database_url))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let templates = LocalResourceReader::new(&config.templates_dir);
    let available = templates.list_files("html").await?;
    if available.is_empty() {
        tracing::warn!(dir = %config.templates_dir.display(), "No page templates found");
    } else {
        tracing::info!(count = available.len(), "Page templates available");
    }

    let repo: Arc<dyn PageRepository> = Arc::new(SqliteRepository::new(pool.clone()));
    let (app_state, coordinator) = AppState::new(
        repo,
        Arc::new(templates),
        Arc::new(LocalResourceReader::new(&config.static_dir)),
        Arc::new(ChromeLauncher),
        shared_config,
    );

    let snapshot_options = app_state.snapshots.options();
    tracing::info!(
        width = snapshot_options.viewport_width,
        height = snapshot_options.viewport_height,
        timeout_secs = snapshot_options.navigation_timeout.as_secs(),
        "Snapshot browser configured"
    );

    let app = Router::new()
        .merge(features::pages::pages_router())
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    // the router, and with it every save handle, is gone; let pending saves finish
    coordinator.await.ok();

    Ok(())
}
