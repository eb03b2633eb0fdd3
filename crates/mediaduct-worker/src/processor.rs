//! Per-delivery processing.
//!
//! [`Processor::handle_delivery`] drives one queue delivery through the
//! idempotency check, the begin-attempt claim, the transform, and the
//! completion commit. Every step is written to tolerate redelivery: the
//! metadata CAS is the single authority on whether an attempt counts, and
//! the queue lease is only acked after the matching record change is
//! committed.

use std::sync::Arc;
use std::time::Duration;

use mediaduct_core::{AppError, MediaItem, MediaStatus};
use mediaduct_db::{MediaPatch, MetadataStore, StatusExpectation, UpdateOutcome};
use mediaduct_processing::MediaTransformer;
use mediaduct_queue::{Delivery, LeaseToken, QueueResult, WorkQueue};
use mediaduct_storage::{BlobStore, StorageError};
use uuid::Uuid;

use crate::config::WorkerConfig;

/// How a delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The item was processed and committed COMPLETED.
    Completed,
    /// The item was already terminal; the redelivery was acked and dropped.
    Discarded,
    /// A transient failure; the message was released for another attempt.
    Requeued,
    /// The item was marked FAILED and the message dead-lettered.
    DeadLettered,
    /// Another worker owns or already resolved the item; nothing of ours
    /// was committed.
    LostClaim,
}

/// Classification of a single attempt's failure.
enum AttemptError {
    /// Deterministic: the same bytes fail the same way on every retry.
    Terminal(AppError),
    /// Environmental: worth handing back for a later attempt.
    Transient(AppError),
}

/// Drives media items from PENDING to a terminal state.
pub struct Processor {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn WorkQueue>,
    transformer: Arc<dyn MediaTransformer>,
    config: WorkerConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn WorkQueue>,
        transformer: Arc<dyn MediaTransformer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            queue,
            transformer,
            config,
        }
    }

    pub(crate) async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        self.queue.receive(wait).await
    }

    /// Handle one delivery to completion.
    ///
    /// Never returns an error: every failure mode maps to an outcome and
    /// the queue lease is resolved (acked, released, or rejected) before
    /// returning, so the pool can treat deliveries as fire-and-forget.
    #[tracing::instrument(
        skip(self, delivery),
        fields(
            media_id = %delivery.message.media_id,
            receive_count = delivery.receive_count,
        )
    )]
    pub async fn handle_delivery(&self, delivery: Delivery) -> ProcessOutcome {
        let media_id = delivery.message.media_id;
        let lease = &delivery.lease;

        let item = match self.store.get(media_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!("No metadata record for queued media, dead-lettering");
                self.reject_quietly(lease).await;
                return ProcessOutcome::DeadLettered;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metadata lookup failed, releasing message");
                self.release_quietly(lease).await;
                return ProcessOutcome::Requeued;
            }
        };

        // Redeliveries of finished work are dropped here, before any blob
        // or transform cost is paid.
        if item.is_terminal() {
            tracing::debug!(status = %item.status, "Item already terminal, discarding redelivery");
            self.ack_quietly(lease).await;
            return ProcessOutcome::Discarded;
        }

        let claimed = match self
            .store
            .conditional_update(
                media_id,
                StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing])
                    .attempts_below(self.config.max_attempts),
                MediaPatch::begin_attempt(),
            )
            .await
        {
            Ok(UpdateOutcome::Applied(item)) => item,
            Ok(UpdateOutcome::Conflict) => {
                return self.resolve_claim_conflict(media_id, lease).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim item, releasing message");
                self.release_quietly(lease).await;
                return ProcessOutcome::Requeued;
            }
        };

        tracing::debug!(attempt = claimed.attempts, "Claimed item for processing");

        match self.run_attempt(&claimed).await {
            Ok(processed_key) => self.commit_completed(&claimed, processed_key, lease).await,
            Err(AttemptError::Terminal(e)) => {
                tracing::error!(error = %e, attempt = claimed.attempts, "Attempt failed permanently");
                self.fail_terminal(media_id, lease).await
            }
            Err(AttemptError::Transient(e)) => {
                if claimed.attempts_exhausted(self.config.max_attempts) {
                    tracing::error!(
                        error = %e,
                        attempts = claimed.attempts,
                        "Retry budget exhausted, failing item"
                    );
                    self.fail_exhausted(media_id, lease).await
                } else {
                    tracing::warn!(
                        error = %e,
                        attempt = claimed.attempts,
                        "Attempt failed, releasing for retry"
                    );
                    self.release_claim(media_id, lease).await;
                    ProcessOutcome::Requeued
                }
            }
        }
    }

    /// Fetch the original, transform it, and write the rendition under the
    /// item's deterministic processed key. Returns that key.
    async fn run_attempt(&self, item: &MediaItem) -> Result<String, AttemptError> {
        let data = self.blobs.get(&item.original_key).await.map_err(|e| match e {
            // The upload grant may simply be unused so far; keep retrying
            // until the blob lands or the attempt budget runs out.
            StorageError::NotFound(_) => AttemptError::Transient(AppError::NotFound(format!(
                "original blob not uploaded yet: {}",
                item.original_key
            ))),
            e if e.is_transient() => AttemptError::Transient(e.into()),
            e => AttemptError::Terminal(e.into()),
        })?;

        let processed = self
            .transformer
            .transform(&data)
            .map_err(|e| AttemptError::Terminal(e.into()))?;

        tracing::debug!(
            source_format = %processed.source_format,
            width = processed.width,
            height = processed.height,
            output_bytes = processed.data.len(),
            "Transformed media"
        );

        let processed_key = item.derived_processed_key();
        self.blobs
            .put(&processed_key, processed.data, processed.content_type)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    AttemptError::Transient(e.into())
                } else {
                    AttemptError::Terminal(e.into())
                }
            })?;

        Ok(processed_key)
    }

    /// Commit PROCESSING -> COMPLETED, then ack. A conflict here means a
    /// concurrent update already resolved the item; their result stands.
    async fn commit_completed(
        &self,
        claimed: &MediaItem,
        processed_key: String,
        lease: &LeaseToken,
    ) -> ProcessOutcome {
        match self
            .store
            .conditional_update(
                claimed.id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::completed(processed_key),
            )
            .await
        {
            Ok(UpdateOutcome::Applied(updated)) => {
                tracing::info!(attempts = updated.attempts, "Media processing completed");
                self.ack_quietly(lease).await;
                ProcessOutcome::Completed
            }
            Ok(UpdateOutcome::Conflict) => {
                tracing::debug!("Completion superseded by a concurrent update");
                self.ack_quietly(lease).await;
                ProcessOutcome::LostClaim
            }
            Err(e) => {
                // The rendition is written but the record is not. Without a
                // committed COMPLETED the message must come back; the next
                // attempt overwrites the same processed key.
                tracing::warn!(error = %e, "Failed to commit completion, releasing message");
                self.release_claim(claimed.id, lease).await;
                ProcessOutcome::Requeued
            }
        }
    }

    /// The begin-attempt CAS did not apply; re-read to find out why.
    async fn resolve_claim_conflict(
        &self,
        media_id: Uuid,
        lease: &LeaseToken,
    ) -> ProcessOutcome {
        let item = match self.store.get(media_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!("Item vanished between read and claim, dead-lettering");
                self.reject_quietly(lease).await;
                return ProcessOutcome::DeadLettered;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metadata re-read failed, releasing message");
                self.release_quietly(lease).await;
                return ProcessOutcome::Requeued;
            }
        };

        if item.is_terminal() {
            tracing::debug!(status = %item.status, "Item reached a terminal state concurrently");
            self.ack_quietly(lease).await;
            return ProcessOutcome::Discarded;
        }

        if item.attempts_exhausted(self.config.max_attempts) {
            tracing::error!(attempts = item.attempts, "Retry budget exhausted, failing item");
            return self.fail_exhausted(media_id, lease).await;
        }

        // A concurrent worker changed the row between our read and the CAS.
        // Release and let redelivery find the settled state.
        tracing::debug!("Claim lost to a concurrent worker, releasing message");
        self.release_quietly(lease).await;
        ProcessOutcome::LostClaim
    }

    /// Mark a claimed item FAILED after a deterministic error and move the
    /// message to the dead-letter pool.
    async fn fail_terminal(&self, media_id: Uuid, lease: &LeaseToken) -> ProcessOutcome {
        match self
            .store
            .conditional_update(
                media_id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::failed(),
            )
            .await
        {
            Ok(UpdateOutcome::Applied(_)) => {
                self.reject_quietly(lease).await;
                ProcessOutcome::DeadLettered
            }
            Ok(UpdateOutcome::Conflict) => {
                tracing::debug!("Failure superseded by a concurrent update");
                self.ack_quietly(lease).await;
                ProcessOutcome::LostClaim
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to record failure, releasing message");
                self.release_claim(media_id, lease).await;
                ProcessOutcome::Requeued
            }
        }
    }

    /// The retry budget is spent; mark the item FAILED from whichever
    /// non-terminal state it is in.
    async fn fail_exhausted(&self, media_id: Uuid, lease: &LeaseToken) -> ProcessOutcome {
        match self
            .store
            .conditional_update(
                media_id,
                StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing]),
                MediaPatch::failed(),
            )
            .await
        {
            Ok(UpdateOutcome::Applied(_)) => {
                self.reject_quietly(lease).await;
                ProcessOutcome::DeadLettered
            }
            Ok(UpdateOutcome::Conflict) => {
                // Only terminal states fall outside the expectation.
                self.ack_quietly(lease).await;
                ProcessOutcome::Discarded
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to record exhaustion, releasing message");
                self.release_quietly(lease).await;
                ProcessOutcome::Requeued
            }
        }
    }

    /// Hand a claimed item back: PROCESSING -> PENDING in the record, then
    /// release the message for prompt redelivery.
    async fn release_claim(&self, media_id: Uuid, lease: &LeaseToken) {
        match self
            .store
            .conditional_update(
                media_id,
                StatusExpectation::one_of(vec![MediaStatus::Processing]),
                MediaPatch::release(),
            )
            .await
        {
            Ok(UpdateOutcome::Applied(_)) => {}
            Ok(UpdateOutcome::Conflict) => {
                tracing::debug!("Release skipped, item no longer in PROCESSING");
            }
            Err(e) => {
                // Begin-attempt also accepts PROCESSING rows, so a status
                // stuck here does not block the next attempt.
                tracing::warn!(error = %e, "Failed to release item status");
            }
        }
        self.release_quietly(lease).await;
    }

    async fn ack_quietly(&self, lease: &LeaseToken) {
        if let Err(e) = self.queue.ack(lease).await {
            tracing::warn!(error = %e, "Ack failed, the redelivery will be discarded as terminal");
        }
    }

    async fn release_quietly(&self, lease: &LeaseToken) {
        if let Err(e) = self.queue.release(lease).await {
            tracing::warn!(error = %e, "Release failed, the lease will lapse on its own");
        }
    }

    async fn reject_quietly(&self, lease: &LeaseToken) {
        if let Err(e) = self.queue.reject(lease).await {
            tracing::warn!(error = %e, "Reject failed, the receive limit will dead-letter the message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use mediaduct_core::WorkMessage;
    use mediaduct_db::MemoryMetadataStore;
    use mediaduct_processing::{ImageTransformer, ProcessedImage, ProcessingError};
    use mediaduct_queue::{MemoryWorkQueue, QueueConfig};
    use mediaduct_storage::MemoryBlobStore;

    struct TestRig {
        store: Arc<MemoryMetadataStore>,
        blobs: Arc<MemoryBlobStore>,
        queue: Arc<MemoryWorkQueue>,
        processor: Processor,
    }

    fn rig() -> TestRig {
        rig_with_transformer(Arc::new(ImageTransformer::default()))
    }

    fn rig_with_transformer(transformer: Arc<dyn MediaTransformer>) -> TestRig {
        let store = Arc::new(MemoryMetadataStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new(QueueConfig::default()));
        let processor = Processor::new(
            store.clone(),
            blobs.clone(),
            queue.clone(),
            transformer,
            WorkerConfig::default(),
        );
        TestRig {
            store,
            blobs,
            queue,
            processor,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 40]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    /// Register an item, optionally upload its blob, and enqueue its message.
    async fn ingest(rig: &TestRig, blob: Option<Vec<u8>>) -> MediaItem {
        let item = MediaItem::new("photo.png", "image/png").unwrap();
        rig.store.create(&item).await.unwrap();
        if let Some(bytes) = blob {
            rig.blobs
                .put(&item.original_key, Bytes::from(bytes), "image/png")
                .await
                .unwrap();
        }
        rig.queue.send(&WorkMessage::for_item(&item)).await.unwrap();
        item
    }

    async fn next_delivery(rig: &TestRig) -> Delivery {
        rig.queue
            .receive(Duration::from_millis(10))
            .await
            .unwrap()
            .expect("expected a delivery")
    }

    async fn stored(rig: &TestRig, id: Uuid) -> MediaItem {
        rig.store.get(id).await.unwrap().expect("item must exist")
    }

    struct CountingTransformer {
        inner: ImageTransformer,
        calls: AtomicUsize,
    }

    impl CountingTransformer {
        fn new() -> Self {
            Self {
                inner: ImageTransformer::default(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MediaTransformer for CountingTransformer {
        fn transform(&self, data: &[u8]) -> Result<ProcessedImage, ProcessingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.transform(data)
        }
    }

    #[tokio::test]
    async fn completes_and_commits_processed_rendition() {
        let rig = rig();
        let item = ingest(&rig, Some(png_bytes(64, 64))).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Completed);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Completed);
        assert_eq!(after.attempts, 1);
        assert_eq!(after.processed_key.as_deref(), Some(item.derived_processed_key().as_str()));
        assert!(after.processed_at.is_some());

        assert_eq!(
            rig.blobs.content_type_of(&item.derived_processed_key()),
            Some("image/jpeg".to_string())
        );

        // The message is gone, not dead-lettered.
        assert!(rig.queue.receive(Duration::ZERO).await.unwrap().is_none());
        assert_eq!(rig.queue.dead_letter_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn redelivery_of_completed_item_is_discarded() {
        let transformer = Arc::new(CountingTransformer::new());
        let rig = rig_with_transformer(transformer.clone());
        let item = ingest(&rig, Some(png_bytes(32, 32))).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Completed);

        // Simulate a duplicate delivery of the same work.
        rig.queue.send(&WorkMessage::for_item(&item)).await.unwrap();
        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Discarded);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Completed);
        assert_eq!(after.attempts, 1);
        // The transform ran exactly once.
        assert_eq!(transformer.calls.load(Ordering::SeqCst), 1);
        assert!(rig.queue.receive(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsupported_bytes_fail_permanently() {
        let rig = rig();
        let item = ingest(&rig, Some(b"definitely not an image".to_vec())).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::DeadLettered);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Failed);
        assert_eq!(after.attempts, 1);
        assert!(after.processed_key.is_none());
        assert!(after.processed_at.is_some());

        assert_eq!(rig.queue.dead_letter_count().await.unwrap(), 1);
        assert!(rig.queue.receive(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn message_without_metadata_record_is_dead_lettered() {
        let rig = rig();
        let orphan = MediaItem::new("ghost.png", "image/png").unwrap();
        rig.queue.send(&WorkMessage::for_item(&orphan)).await.unwrap();

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(rig.queue.dead_letter_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_blob_releases_for_retry() {
        let rig = rig();
        let item = ingest(&rig, None).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Requeued);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Pending);
        assert_eq!(after.attempts, 1);

        // Released promptly: the same message is immediately claimable.
        let redelivery = next_delivery(&rig).await;
        assert_eq!(redelivery.receive_count, 2);
        assert_eq!(redelivery.message.media_id, item.id);
    }

    #[tokio::test]
    async fn transient_failures_exhaust_into_failed() {
        let rig = rig();
        let item = ingest(&rig, None).await;

        // Attempts one and two release; the third burns the last of the
        // budget and the item fails for good.
        for expected_attempts in 1..=2 {
            let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
            assert_eq!(outcome, ProcessOutcome::Requeued);
            assert_eq!(stored(&rig, item.id).await.attempts, expected_attempts);
        }

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::DeadLettered);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Failed);
        assert_eq!(after.attempts, 3);
        assert!(after.processed_key.is_none());
        assert_eq!(rig.queue.dead_letter_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fails_once_then_succeeds_on_redelivery() {
        let rig = rig();
        let item = ingest(&rig, None).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Requeued);

        // The upload lands between attempts.
        rig.blobs
            .put(&item.original_key, Bytes::from(png_bytes(48, 48)), "image/png")
            .await
            .unwrap();

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Completed);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Completed);
        assert_eq!(after.attempts, 2);
        assert!(after.processed_key.is_some());
    }

    #[tokio::test]
    async fn exhausted_budget_is_failed_at_claim_time() {
        let rig = rig();
        let item = ingest(&rig, Some(png_bytes(16, 16))).await;

        // Burn the whole attempt budget outside this delivery.
        for _ in 0..3 {
            let claimed = rig
                .store
                .conditional_update(
                    item.id,
                    StatusExpectation::one_of(vec![MediaStatus::Pending, MediaStatus::Processing])
                        .attempts_below(3),
                    MediaPatch::begin_attempt(),
                )
                .await
                .unwrap();
            assert!(claimed.is_applied());
            rig.store
                .conditional_update(
                    item.id,
                    StatusExpectation::one_of(vec![MediaStatus::Processing]),
                    MediaPatch::release(),
                )
                .await
                .unwrap();
        }

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::DeadLettered);

        let after = stored(&rig, item.id).await;
        assert_eq!(after.status, MediaStatus::Failed);
        assert_eq!(after.attempts, 3);
        assert_eq!(rig.queue.dead_letter_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn oversized_upload_is_bounded_by_transform() {
        let rig = rig();
        let item = ingest(&rig, Some(png_bytes(2400, 1200))).await;

        let outcome = rig.processor.handle_delivery(next_delivery(&rig).await).await;
        assert_eq!(outcome, ProcessOutcome::Completed);

        let rendition = rig.blobs.get(&item.derived_processed_key()).await.unwrap();
        let decoded = image::load_from_memory(&rendition).unwrap();
        assert!(decoded.width() <= 1920);
        assert!(decoded.height() <= 1080);
        assert_eq!(
            image::guess_format(&rendition).unwrap(),
            image::ImageFormat::Jpeg
        );
    }
}
