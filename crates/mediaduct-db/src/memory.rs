use crate::traits::{
    MediaPatch, MetadataError, MetadataResult, MetadataStore, StatusExpectation, UpdateOutcome,
};
use async_trait::async_trait;
use mediaduct_core::MediaItem;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory metadata store for tests and infrastructure-free runs.
///
/// Conditional update semantics mirror the PostgreSQL implementation:
/// `None` patch fields keep the stored value, and a failed precondition
/// leaves the record untouched.
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    items: Arc<RwLock<HashMap<Uuid, MediaItem>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create(&self, item: &MediaItem) -> MetadataResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| MetadataError::BackendError("item map lock poisoned".to_string()))?;
        if items.contains_key(&item.id) {
            return Err(MetadataError::Duplicate(item.id));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> MetadataResult<Option<MediaItem>> {
        let items = self
            .items
            .read()
            .map_err(|_| MetadataError::BackendError("item map lock poisoned".to_string()))?;
        Ok(items.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expect: StatusExpectation,
        patch: MediaPatch,
    ) -> MetadataResult<UpdateOutcome> {
        let mut items = self
            .items
            .write()
            .map_err(|_| MetadataError::BackendError("item map lock poisoned".to_string()))?;

        let Some(item) = items.get_mut(&id) else {
            return Ok(UpdateOutcome::Conflict);
        };

        if !expect.any_of.contains(&item.status) {
            return Ok(UpdateOutcome::Conflict);
        }
        if let Some(ceiling) = expect.attempts_below {
            if item.attempts >= ceiling {
                return Ok(UpdateOutcome::Conflict);
            }
        }

        item.status = patch.status;
        if let Some(key) = patch.processed_key {
            item.processed_key = Some(key);
        }
        if let Some(at) = patch.processed_at {
            item.processed_at = Some(at);
        }
        if patch.bump_attempts {
            item.attempts += 1;
        }

        Ok(UpdateOutcome::Applied(item.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaduct_core::MediaStatus;

    fn pending_item() -> MediaItem {
        MediaItem::new("photo.jpg", "image/jpeg").unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();

        store.create(&item).await.unwrap();
        let fetched = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, item.id);
        assert_eq!(fetched.status, MediaStatus::Pending);
        assert_eq!(fetched.attempts, 0);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();

        store.create(&item).await.unwrap();
        let err = store.create(&item).await.unwrap_err();
        assert!(matches!(err, MetadataError::Duplicate(id) if id == item.id));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn get_missing_id_is_none() {
        let store = MemoryMetadataStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn begin_attempt_claims_and_counts() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();
        store.create(&item).await.unwrap();

        let outcome = store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing])
                    .attempts_below(3),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();

        let UpdateOutcome::Applied(updated) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(updated.status, MediaStatus::Processing);
        assert_eq!(updated.attempts, 1);
    }

    #[tokio::test]
    async fn wrong_status_yields_conflict_and_no_change() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();
        store.create(&item).await.unwrap();

        store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending]),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();
        store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::completed("processed/x".to_string()),
            )
            .await
            .unwrap();

        // Item is now COMPLETED; a late claim attempt must not touch it.
        let outcome = store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing]),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();
        assert!(!outcome.is_applied());

        let stored = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MediaStatus::Completed);
        assert_eq!(stored.processed_key.as_deref(), Some("processed/x"));
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn attempts_ceiling_blocks_further_claims() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();
        store.create(&item).await.unwrap();

        for _ in 0..3 {
            let outcome = store
                .conditional_update(
                    item.id,
                    StatusExpectation::one_of(vec![
                        MediaStatus::Pending,
                        MediaStatus::Processing,
                    ])
                    .attempts_below(3),
                    MediaPatch::begin_attempt(),
                )
                .await
                .unwrap();
            assert!(outcome.is_applied());
        }

        let outcome = store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing])
                    .attempts_below(3),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();
        assert!(!outcome.is_applied());

        let stored = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 3);
    }

    #[tokio::test]
    async fn completed_patch_keeps_untouched_fields() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();
        let original_key = item.original_key.clone();
        store.create(&item).await.unwrap();

        store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending]),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();
        store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::completed(item.derived_processed_key()),
            )
            .await
            .unwrap();

        let stored = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.original_key, original_key);
        assert_eq!(stored.status, MediaStatus::Completed);
        assert!(stored.processed_at.is_some());
        assert_eq!(
            stored.processed_key.as_deref(),
            Some(item.derived_processed_key().as_str())
        );
    }

    #[tokio::test]
    async fn release_returns_item_to_pending_without_counting() {
        let store = MemoryMetadataStore::new();
        let item = pending_item();
        store.create(&item).await.unwrap();

        store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Pending]),
                MediaPatch::begin_attempt(),
            )
            .await
            .unwrap();
        let outcome = store
            .conditional_update(
                item.id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::release(),
            )
            .await
            .unwrap();

        let UpdateOutcome::Applied(updated) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(updated.status, MediaStatus::Pending);
        assert_eq!(updated.attempts, 1);
        assert!(updated.processed_at.is_none());
    }
}
