//! Backing store for uploaded media files.
//!
//! Paths handed to a store are relative storage paths such as
//! `server/server_icon/<uuid>.png`, never absolute filesystem paths.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File store trait. Implementations must be shareable across request tasks.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write data at the given storage path, creating parent directories.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete the file at the given storage path. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check whether a file exists at the given storage path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Local filesystem store rooted at the configured media directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a storage path under the media root.
    ///
    /// Rejects absolute paths and `..` components so a stored reference can
    /// never point outside the media root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            anyhow::bail!("empty storage path");
        }
        for component in Path::new(path).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => anyhow::bail!("storage path escapes media root: {path}"),
            }
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create media directories")?;
        }

        let mut file = fs::File::create(&full)
            .await
            .context("failed to create media file")?;
        file.write_all(data)
            .await
            .context("failed to write media file")?;
        file.flush().await.context("failed to flush media file")?;

        debug!(path = %path, size = data.len(), "media file written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;

        if fs::try_exists(&full).await.unwrap_or(false) {
            fs::remove_file(&full)
                .await
                .context("failed to delete media file")?;
            debug!(path = %path, "media file deleted");
        } else {
            warn!(path = %path, "media file not found for deletion");
        }

        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(fs::try_exists(&full).await.unwrap_or(false))
    }
}
