//! Blob storage for book files and covers.
//!
//! Blobs are opaque byte strings addressed by `/`-separated keys such as
//! `books/<hex>` or `covers/<hex>`. The lifecycle code only sees the
//! [`BlobStore`] trait; [`FsBlobStore`] keeps blobs as plain files under a
//! base directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use libris_shared::constants::{BOOK_FILES_NAMESPACE, COVERS_NAMESPACE};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Blob I/O error on {key}: {message}")]
    Io { key: String, message: String },
}

/// Byte storage addressed by opaque string keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, BlobError>;

    /// Write `data` under `key`, replacing any previous content.
    async fn save(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Read the blob. A missing key is [`BlobError::NotFound`].
    async fn open(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// Remove the blob. A missing key is [`BlobError::NotFound`].
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Key of an uploaded book file.
pub fn book_file_key(storage_key: &Uuid) -> String {
    format!("{}/{}", BOOK_FILES_NAMESPACE, storage_key.simple())
}

/// Key of a book's cover image.
pub fn cover_key(book_uuid: &Uuid) -> String {
    format!("{}/{}", COVERS_NAMESPACE, book_uuid.simple())
}

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, key: &str) -> Result<PathBuf, BlobError> {
    if key.is_empty() || key.contains('\\') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }

    let mut resolved = base.to_path_buf();
    for segment in key.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) => resolved.push(c),
            // empty segments, `.`, `..`, roots and drive prefixes
            _ => return Err(BlobError::InvalidKey(key.to_string())),
        }
    }

    if !resolved.starts_with(base) {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(resolved)
}

fn io_error(key: &str, e: std::io::Error) -> BlobError {
    if e.kind() == ErrorKind::NotFound {
        BlobError::NotFound(key.to_string())
    } else {
        BlobError::Io {
            key: key.to_string(),
            message: e.to_string(),
        }
    }
}

/// Filesystem-backed [`BlobStore`].
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FsBlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, BlobError> {
        fs::create_dir_all(&base_path).await.map_err(|e| BlobError::Io {
            key: base_path.display().to_string(),
            message: format!("failed to create blob directory: {e}"),
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        ensure_within(&self.base_path, key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.path_for(key)?;
        fs::try_exists(&path).await.map_err(|e| io_error(key, e))
    }

    async fn save(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        if data.len() > self.max_size {
            return Err(BlobError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| io_error(key, e))?;
        }

        // Write next to the target, then rename over it
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(key, e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(key, e));
        }

        debug!(key, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        let data = fs::read(&path).await.map_err(|e| io_error(key, e))?;

        debug!(key, size = data.len(), "Read blob");
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).await.map_err(|e| io_error(key, e))?;

        debug!(key, "Deleted blob");
        Ok(())
    }
}
