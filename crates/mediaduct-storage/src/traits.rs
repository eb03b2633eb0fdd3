//! Blob store abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use mediaduct_core::{AppError, StorageBackend};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether the worker may retry after this error. Missing blobs are not
    /// transient from the store's point of view; the worker applies its own
    /// policy there (the client may still be uploading).
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StorageError::NotFound(_) | StorageError::InvalidKey(_) | StorageError::ConfigError(_)
        )
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Blob store abstraction trait
///
/// All backends (S3, local filesystem, in-memory) implement this trait so
/// the handlers and the worker can be constructed against any of them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write data to a specific storage key, returning the public URL.
    /// Writes are overwrite-idempotent: re-putting the same key is safe.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String>;

    /// Read a blob by key. Absent keys yield `StorageError::NotFound`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete a blob by key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Generate a presigned/temporary URL for direct download (GET).
    async fn get_presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Generate a presigned PUT URL (the upload grant). Clients upload with
    /// HTTP PUT to the returned URL without going through the API server.
    async fn presigned_put_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
