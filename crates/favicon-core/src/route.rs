//! Resource path matching

/// Default path the icon is served from
pub const DEFAULT_ROUTE: &str = "/favicon.ico";

/// The single path a responder intercepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoute {
    path: String,
}

impl ResourceRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a request target names this resource
    ///
    /// Accepts either a bare path or a raw target; any query string or
    /// fragment is ignored.
    pub fn matches(&self, target: &str) -> bool {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        target[..end] == self.path
    }
}

impl Default for ResourceRoute {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE)
    }
}
