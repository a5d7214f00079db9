//! HTTP mapping for core errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orgtree_core::OrgtreeError;
use serde_json::json;

/// Wrapper turning `OrgtreeError` into an HTTP response via its
/// `http_status()`. Validation failures carry their field errors in the
/// body; everything else is a single message.
pub struct AppError(pub OrgtreeError);

impl From<OrgtreeError> for AppError {
    fn from(err: OrgtreeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = match &self.0 {
            OrgtreeError::ValidationFailed(fields) => {
                json!({ "error": self.0.to_string(), "errors": fields })
            }
            _ => json!({ "error": self.0.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
