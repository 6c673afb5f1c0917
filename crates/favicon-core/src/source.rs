//! Icon byte sources for lazily-built snapshots

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::error::{ConfigError, IconError};

/// Source of icon bytes
///
/// Read at most once per successful snapshot build.
#[async_trait]
pub trait IconSource: Send + Sync {
    /// Read the icon fully into memory
    async fn load(&self) -> Result<Bytes, IconError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Icon backed by a file on local disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Resolve `path` to an absolute path and check that it names a file
    ///
    /// This only stats the path; the file itself is read on first use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = resolve_icon_path(path.as_ref())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IconSource for FileSource {
    async fn load(&self) -> Result<Bytes, IconError> {
        debug!("Reading icon from {:?}", self.path);

        let data = fs::read(&self.path).await.map_err(|source| IconError::Read {
            path: self.path.clone(),
            source: Arc::new(source),
        })?;

        Ok(Bytes::from(data))
    }

    fn describe(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// Icon bytes already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Copy `data` so later changes to the caller's buffer are not observed
    pub fn copy_from(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl IconSource for MemorySource {
    async fn load(&self) -> Result<Bytes, IconError> {
        Ok(self.data.clone())
    }

    fn describe(&self) -> String {
        format!("<buffer: {} bytes>", self.data.len())
    }
}

/// Make `path` absolute and reject directories and missing files
pub fn resolve_icon_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let path = std::path::absolute(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = std::fs::metadata(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.clone() }
        } else {
            ConfigError::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    if metadata.is_dir() {
        return Err(ConfigError::IsDirectory { path });
    }

    Ok(path)
}
