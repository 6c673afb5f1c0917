//! API routes

mod health;
pub mod metrics;

use axum::{Router, http::Uri, middleware, response::IntoResponse};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::favicon_middleware;
use crate::state::{AppState, MetricsHandle};

/// Fallback for anything no route or the favicon middleware handled
async fn not_found(uri: Uri) -> impl IntoResponse {
    ApiError::NotFound(uri.path().to_string())
}

/// Create the main router
///
/// The favicon middleware wraps every route, so it sees each request first.
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let responder = state.responder.clone();

    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(responder, favicon_middleware))
}
