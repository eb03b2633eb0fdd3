use crate::keys::validate_key;
use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store, for development and single-node deployments.
///
/// Objects live under `base_path` with the blob key as the relative path.
/// URLs are formed as `{base_url}/{key}`; a reverse proxy or static file
/// server is expected to serve the directory at that URL.
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!(
                "failed to canonicalize storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a blob key to an absolute path under `base_path`.
    ///
    /// Rejects keys whose components would escape the storage root.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "key '{}' contains invalid path component",
                        key
                    )))
                }
            }
        }

        Ok(self.base_path.join(relative))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        tracing::info!(
            key = %key,
            path = %path.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local put successful"
        );

        Ok(self.generate_url(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn get_presigned_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        // Local mode has no signing; the public URL is served directly.
        validate_key(key)?;
        Ok(self.generate_url(key))
    }

    async fn presigned_put_url(
        &self,
        key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        Ok(self.generate_url(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store(dir: &tempfile::TempDir) -> LocalBlobStore {
        LocalBlobStore::new(dir.path(), "http://localhost:4000/files".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        let url = store
            .put("abc/photo.jpg", Bytes::from_static(b"hello"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:4000/files/abc/photo.jpg");

        let data = store.get("abc/photo.jpg").await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        let err = store.get("missing/file.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        store
            .put("a/b.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        store.delete("a/b.png").await.unwrap();
        store.delete("a/b.png").await.unwrap();
        assert!(!store.exists("a/b.png").await.unwrap());
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        store
            .put("k/v.bin", Bytes::from_static(b"one"), "application/octet-stream")
            .await
            .unwrap();
        store
            .put("k/v.bin", Bytes::from_static(b"two"), "application/octet-stream")
            .await
            .unwrap();

        let data = store.get("k/v.bin").await.unwrap();
        assert_eq!(&data[..], b"two");
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        let err = store
            .put("../escape.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn presigned_urls_point_at_public_base() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        let get_url = store
            .get_presigned_url("m/1.jpg", Duration::from_secs(3600))
            .await
            .unwrap();
        let put_url = store
            .presigned_put_url("m/1.jpg", "image/jpeg", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(get_url, "http://localhost:4000/files/m/1.jpg");
        assert_eq!(put_url, get_url);
    }
}
