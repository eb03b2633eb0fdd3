use crate::keys::validate_key;
use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// In-memory blob store backed by a `HashMap`.
///
/// Used for tests and for running the pipeline without external
/// infrastructure. Grant URLs use the `memory://` scheme and are not
/// fetchable; callers in this mode write blobs through `put` directly.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, (Bytes, String)>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, for test assertions.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for a key, if present.
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.blobs
            .read()
            .ok()
            .and_then(|m| m.get(key).map(|(_, ct)| ct.clone()))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("memory:///{}", key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        validate_key(key)?;
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| StorageError::BackendError("blob map lock poisoned".to_string()))?;
        blobs.insert(key.to_string(), (data, content_type.to_string()));
        Ok(self.generate_url(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::BackendError("blob map lock poisoned".to_string()))?;
        blobs
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| StorageError::BackendError("blob map lock poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::BackendError("blob map lock poisoned".to_string()))?;
        Ok(blobs.contains_key(key))
    }

    async fn get_presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        validate_key(key)?;
        Ok(format!(
            "memory:///{}?expires_in={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn presigned_put_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        Ok(format!(
            "memory:///{}?expires_in={}",
            key,
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
