//! Application state

use favicon_core::ConditionalResponder;
use std::sync::Arc;

/// Prometheus recorder handle used by the `/metrics` route
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub responder: Arc<ConditionalResponder>,
}

impl AppState {
    pub fn new(responder: Arc<ConditionalResponder>) -> Self {
        Self { responder }
    }
}
