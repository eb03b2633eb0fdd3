use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use mediaduct_core::Config;
use std::sync::Arc;

/// Create a blob store from configuration.
///
/// Backend selection follows `STORAGE_BACKEND` (unset means S3, matching
/// config validation); backends compiled out via feature flags return a
/// configuration error rather than panicking.
pub async fn create_blob_store(config: &Config) -> StorageResult<Arc<dyn BlobStore>> {
    match config.storage_backend().unwrap_or(StorageBackend::S3) {
        StorageBackend::S3 => {
            #[cfg(feature = "storage-s3")]
            {
                let bucket = config.s3_bucket().ok_or_else(|| {
                    StorageError::ConfigError("S3_BUCKET is required for the s3 backend".to_string())
                })?;
                let region = config.s3_region().ok_or_else(|| {
                    StorageError::ConfigError("S3_REGION is required for the s3 backend".to_string())
                })?;

                tracing::info!(
                    backend = "s3",
                    bucket = %bucket,
                    region = %region,
                    "Initializing blob store"
                );

                let store = crate::s3::S3BlobStore::new(
                    bucket.to_string(),
                    region.to_string(),
                    config.s3_endpoint().map(|s| s.to_string()),
                )
                .await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "storage-s3"))]
            {
                Err(StorageError::ConfigError(
                    "s3 backend requested but the storage-s3 feature is disabled".to_string(),
                ))
            }
        }
        StorageBackend::Local => {
            #[cfg(feature = "storage-local")]
            {
                let path = config.local_storage_path().ok_or_else(|| {
                    StorageError::ConfigError(
                        "LOCAL_STORAGE_PATH is required for the local backend".to_string(),
                    )
                })?;
                let base_url = config.local_storage_base_url().ok_or_else(|| {
                    StorageError::ConfigError(
                        "LOCAL_STORAGE_BASE_URL is required for the local backend".to_string(),
                    )
                })?;

                tracing::info!(
                    backend = "local",
                    path = %path,
                    "Initializing blob store"
                );

                let store =
                    crate::local::LocalBlobStore::new(path.to_string(), base_url.to_string())
                        .await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "storage-local"))]
            {
                Err(StorageError::ConfigError(
                    "local backend requested but the storage-local feature is disabled".to_string(),
                ))
            }
        }
        StorageBackend::Memory => {
            tracing::info!(backend = "memory", "Initializing blob store");
            Ok(Arc::new(crate::memory::MemoryBlobStore::new()))
        }
    }
}
