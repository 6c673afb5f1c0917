//! Core error types

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Construction-time failure for a path-backed icon
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("EISDIR, illegal operation on directory '{}'", path.display())]
    IsDirectory { path: PathBuf },

    #[error("ENOENT, no such file or directory '{}'", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to stat icon '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Machine-distinguishable kind of a [`ConfigError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    IsDirectory,
    NotFound,
    Io,
}

impl ConfigError {
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigError::IsDirectory { .. } => ConfigErrorKind::IsDirectory,
            ConfigError::NotFound { .. } => ConfigErrorKind::NotFound,
            ConfigError::Io { .. } => ConfigErrorKind::Io,
        }
    }

    /// The offending path
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::IsDirectory { path }
            | ConfigError::NotFound { path }
            | ConfigError::Io { path, .. } => path,
        }
    }
}

/// Request-time failure while producing an icon response
///
/// Cloneable so a single failed load can be handed to every request that
/// was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum IconError {
    #[error("Failed to read icon '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Invalid header value: {0}")]
    InvalidHeader(Arc<http::header::InvalidHeaderValue>),
}

impl From<http::header::InvalidHeaderValue> for IconError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        IconError::InvalidHeader(Arc::new(err))
    }
}
