//! Immutable icon snapshot with precomputed validators

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::lifetime::cache_control_value;

/// The icon bytes plus everything derived from them
///
/// Built once per responder and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSnapshot {
    body: Bytes,
    etag: String,
    cache_control: String,
}

impl IconSnapshot {
    /// Build a snapshot from owned bytes
    pub fn new(body: Bytes, max_age_ms: u64) -> Self {
        let etag = compute_etag(&body);
        Self {
            body,
            etag,
            cache_control: cache_control_value(max_age_ms),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Strong entity tag, including the surrounding quotes
    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn cache_control(&self) -> &str {
        &self.cache_control
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Compute a strong entity tag from content alone
pub fn compute_etag(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}
