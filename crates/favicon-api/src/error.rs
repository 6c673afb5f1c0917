//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Icon error: {0}")]
    Icon(#[from] favicon_core::IconError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Icon(e) => {
                warn!("Failed to serve icon: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ICON_UNAVAILABLE",
                    e.to_string(),
                )
            }
        };

        let body = axum::Json(json!({
            "errors": [{
                "code": code,
                "message": message,
            }]
        }));

        (status, body).into_response()
    }
}
