//! Favicon Cache HTTP layer
//!
//! This crate mounts a [`favicon_core::ConditionalResponder`] in front of an
//! Axum router as middleware, plus the health and metrics routes.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use middleware::favicon_middleware;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
