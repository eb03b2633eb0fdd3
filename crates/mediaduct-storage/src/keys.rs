//! Shared key validation for storage backends.
//!
//! Key generation itself lives on `MediaItem` (original and processed key
//! layout); backends only need to agree on what a well-formed key is.

use crate::traits::{StorageError, StorageResult};

/// Reject keys that could escape the storage root or alias other objects.
/// Applied by every backend before touching the key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey(
            "Storage key must not be empty".to_string(),
        ));
    }
    if key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
