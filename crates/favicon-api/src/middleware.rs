//! Favicon middleware for Axum

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use favicon_core::ConditionalResponder;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;

/// Favicon middleware
///
/// Answers requests for the responder's route and passes everything else,
/// untouched, to `next`.
pub async fn favicon_middleware(
    State(responder): State<Arc<ConditionalResponder>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let handled = responder
        .handle(request.method(), request.uri().path(), request.headers())
        .await?;

    let Some(response) = handled else {
        return Ok(next.run(request).await);
    };

    debug!("{} {} -> {}", request.method(), request.uri(), response.status());

    metrics::counter!(
        "favicon_responses_total",
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    Ok(response.map(Body::from))
}
