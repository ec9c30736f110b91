pub mod model;

use crate::AppState;
use crate::error::PageError;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use http::HeaderMap;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use model::{JsonPageVersion, JsonVersionEdit, page_version_to_json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_128;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn pages_router() -> Router<AppState> {
    Router::new()
        // `{uuid}.html`, `{uuid}.png` and `{hash}` share a segment, so the
        // extension is told apart in the handlers
        .route("/pages/page-editor/{file}", get(editable_frame_handler))
        .route("/pages/preview/{key}", get(preview_handler))
        .route("/api/pages", post(create_page_handler))
        .route("/api/pages/{page_id}/versions", get(list_versions_handler))
        .route("/api/pages/{page_id}/drafts", post(create_draft_handler))
        .route(
            "/api/page-versions/{version_id}",
            put(save_version_handler).delete(discard_version_handler),
        )
        .route(
            "/api/page-versions/{version_id}/publish",
            post(publish_version_handler),
        )
}

async fn editable_frame_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Html<String>, PageError> {
    let raw_id = file
        .strip_suffix(".html")
        .ok_or_else(|| PageError::version_not_found(&file))?;
    let version_id = Uuid::parse_str(raw_id).map_err(|_| PageError::version_not_found(raw_id))?;

    let html = state.renderer.render_editable_frame(version_id).await?;

    Ok(Html(html))
}

async fn preview_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(raw_id) = key.strip_suffix(".png") {
        let version = state.resolver.find_by_raw_id(raw_id).await?;
        let preview_url = state.config.preview_url(version.hash.as_str());

        let png = state.snapshots.capture_snapshot(&preview_url).await?;

        return Ok(([(CONTENT_TYPE, "image/png")], png).into_response());
    }

    let version = state.resolver.resolve_by_hash(&key).await?;
    let html = state.renderer.render_page(&version).await?;

    // the hash only covers the blocks; title, description and template can still
    // change the page, so caches revalidate against a tag of the rendered bytes
    let etag = format!("\"{:032x}\"", xxh3_128(html.as_bytes()));
    let cache_headers = [(CACHE_CONTROL, "no-cache".to_string()), (ETAG, etag.clone())];

    if etag_matches(&headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers).into_response());
    }

    Ok((cache_headers, Html(html)).into_response())
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == etag || candidate == "*")
}

#[derive(Deserialize)]
struct CreatePageRequest {
    label: String,
    template: String,
}

#[derive(Serialize)]
struct JsonPage {
    id: Uuid,
    label: String,
    template: String,
    current_version_id: Option<Uuid>,
}

async fn create_page_handler(
    State(state): State<AppState>,
    Json(request): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<JsonPage>), PageError> {
    let page = state
        .publishing
        .create_page(&request.label, &request.template)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(JsonPage {
            id: page.id,
            label: page.label,
            template: page.template,
            current_version_id: page.current_version_id,
        }),
    ))
}

async fn list_versions_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<Vec<JsonPageVersion>>, PageError> {
    let page_id = Uuid::parse_str(&page_id).map_err(|_| PageError::page_not_found(&page_id))?;

    let versions = state.publishing.versions(page_id).await?;

    Ok(Json(
        versions
            .iter()
            .map(|version| page_version_to_json(version, DATETIME_FORMAT))
            .collect(),
    ))
}

async fn create_draft_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<(StatusCode, Json<JsonPageVersion>), PageError> {
    let page_id = Uuid::parse_str(&page_id).map_err(|_| PageError::page_not_found(&page_id))?;

    let draft = state.publishing.create_draft(page_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(page_version_to_json(&draft, DATETIME_FORMAT)),
    ))
}

async fn save_version_handler(
    State(state): State<AppState>,
    Path(version_id): Path<String>,
    Json(edit): Json<JsonVersionEdit>,
) -> Result<Json<JsonPageVersion>, PageError> {
    let version_id = parse_version_id(&version_id)?;

    let saved = state.saves.save(version_id, edit.into()).await?;

    Ok(Json(page_version_to_json(&saved, DATETIME_FORMAT)))
}

async fn publish_version_handler(
    State(state): State<AppState>,
    Path(version_id): Path<String>,
) -> Result<Json<JsonPageVersion>, PageError> {
    let version_id = parse_version_id(&version_id)?;

    let (_page, version) = state.publishing.publish(version_id).await?;

    Ok(Json(page_version_to_json(&version, DATETIME_FORMAT)))
}

async fn discard_version_handler(
    State(state): State<AppState>,
    Path(version_id): Path<String>,
) -> Result<StatusCode, PageError> {
    let version_id = parse_version_id(&version_id)?;

    state.publishing.discard(version_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn parse_version_id(raw: &str) -> Result<Uuid, PageError> {
    Uuid::parse_str(raw).map_err(|_| PageError::version_not_found(raw))
}
