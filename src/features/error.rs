use crate::error::PageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            PageError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PageError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            PageError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            PageError::Rendering { .. } => {
                tracing::error!(error = %self, "Page could not be rendered");
                (StatusCode::INTERNAL_SERVER_ERROR, "RENDERING_ERROR")
            }
            PageError::Io { .. } => {
                tracing::error!(error = %self, "Resource could not be read");
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")
            }
            PageError::Capture(_) => {
                tracing::error!(error = %self, "Snapshot capture failed");
                (StatusCode::BAD_GATEWAY, "CAPTURE_ERROR")
            }
            PageError::Storage(_) => {
                tracing::error!(error = %self, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
            }
        };

        // internals stay in the log
        let message = if status.is_server_error() {
            match code {
                "CAPTURE_ERROR" => "The page snapshot could not be captured".to_string(),
                _ => "The page could not be rendered".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
