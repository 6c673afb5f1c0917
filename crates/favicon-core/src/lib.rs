//! Favicon Cache Core
//!
//! This crate provides the conditional-response core for serving a single
//! icon: lifetime normalization, the once-built content snapshot, ETag
//! freshness evaluation, and the GET/HEAD/OPTIONS responder.

pub mod error;
pub mod freshness;
pub mod lifetime;
pub mod responder;
pub mod route;
pub mod snapshot;
pub mod source;

pub use error::{ConfigError, ConfigErrorKind, IconError};
pub use freshness::is_fresh;
pub use lifetime::{
    LifetimeSpec, ONE_YEAR_MS, ParseLifetimeError, TimeUnit, normalize, parse_duration,
};
pub use responder::{ALLOWED_METHODS, ConditionalResponder, FaviconOptions, ICON_CONTENT_TYPE};
pub use route::{DEFAULT_ROUTE, ResourceRoute};
pub use snapshot::{IconSnapshot, compute_etag};
pub use source::{FileSource, IconSource, MemorySource};
