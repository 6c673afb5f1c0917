//! Prometheus metrics endpoint

use axum::{
    Router,
    extract::State,
    http::header::{CONTENT_TYPE, HeaderValue},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::state::MetricsHandle;

/// Prefix shared by every series this service records
const METRIC_PREFIX: &str = "favicon_";

/// Content type of the Prometheus text exposition format
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Create the `/metrics` route backed by the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(handle)
}

/// GET /metrics - the favicon series only
///
/// The recorder is process-global, so anything else the host application
/// records is left out.
async fn get_metrics(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    let body = favicon_series(&handle.render());
    (
        [(CONTENT_TYPE, HeaderValue::from_static(EXPOSITION_CONTENT_TYPE))],
        body,
    )
}

/// Keep the samples and `# HELP`/`# TYPE` lines of `favicon_*` series
fn favicon_series(rendered: &str) -> String {
    let mut out = String::new();
    for line in rendered.lines() {
        let name = match line.strip_prefix('#') {
            Some(comment) => comment.split_whitespace().nth(1).unwrap_or(""),
            None => line,
        };
        if name.starts_with(METRIC_PREFIX) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
