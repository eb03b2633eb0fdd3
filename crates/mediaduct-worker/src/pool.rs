//! Worker pool supervising delivery handlers.
//!
//! [`WorkerPool::new`] spawns a supervisor task that pulls deliveries off
//! the work queue and fans each out to its own handler task, with at most
//! `max_workers` in flight. Receive failures back off exponentially so a
//! down queue backend is not hammered. On shutdown the supervisor stops
//! claiming and waits up to `shutdown_grace` for in-flight handlers;
//! unfinished work returns to the queue when its lease lapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::processor::Processor;

const MAX_POLL_BACKOFF_SECS: u64 = 300;

/// Handle to a running worker pool.
pub struct WorkerPool {
    shutdown_tx: mpsc::Sender<()>,
}

impl WorkerPool {
    /// Spawn the supervisor loop for `processor`.
    pub fn new(processor: Arc<Processor>, config: WorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(run(processor, config, shutdown_rx));
        Self { shutdown_tx }
    }

    /// Signal the pool to stop claiming new deliveries.
    ///
    /// Returns as soon as the signal is sent; the supervisor then waits up
    /// to the configured grace period for in-flight handlers to finish.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            warn!("Worker pool already stopped");
        }
    }
}

async fn run(processor: Arc<Processor>, config: WorkerConfig, mut shutdown_rx: mpsc::Receiver<()>) {
    info!(
        max_workers = config.max_workers,
        poll_wait_ms = config.poll_wait.as_millis() as u64,
        max_attempts = config.max_attempts,
        "Worker pool started"
    );

    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut consecutive_errors: u32 = 0;

    'main: loop {
        // Hold a slot before claiming, so a claimed message never waits on
        // a busy pool while its lease runs down.
        let permit = tokio::select! {
            _ = shutdown_rx.recv() => break 'main,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break 'main,
            },
        };

        let received = tokio::select! {
            _ = shutdown_rx.recv() => {
                drop(permit);
                break 'main;
            }
            received = processor.receive(config.poll_wait) => received,
        };

        match received {
            Ok(Some(delivery)) => {
                consecutive_errors = 0;
                let processor = processor.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = processor.handle_delivery(delivery).await;
                    debug!(outcome = ?outcome, "Delivery handled");
                });
            }
            Ok(None) => {
                drop(permit);
                consecutive_errors = 0;
            }
            Err(e) => {
                drop(permit);
                consecutive_errors += 1;
                let backoff = compute_poll_backoff(consecutive_errors);
                error!(
                    error = %e,
                    consecutive_errors,
                    backoff_secs = backoff.as_secs(),
                    "Failed to receive from work queue, backing off"
                );
                tokio::select! {
                    _ = shutdown_rx.recv() => break 'main,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    info!("Worker pool draining in-flight handlers");
    match tokio::time::timeout(
        config.shutdown_grace,
        semaphore.acquire_many(config.max_workers as u32),
    )
    .await
    {
        Ok(_) => info!("Worker pool stopped"),
        Err(_) => warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Worker pool stopped with handlers still in flight"
        ),
    };
}

/// Exponential backoff for consecutive receive failures: 1s, 2s, 4s, ...
/// capped at five minutes.
#[inline]
pub(crate) fn compute_poll_backoff(consecutive_errors: u32) -> Duration {
    let exp = consecutive_errors.saturating_sub(1).min(16);
    Duration::from_secs(2_u64.pow(exp).min(MAX_POLL_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use bytes::Bytes;
    use mediaduct_core::{MediaItem, MediaStatus, WorkMessage};
    use mediaduct_db::{MemoryMetadataStore, MetadataStore};
    use mediaduct_processing::ImageTransformer;
    use mediaduct_queue::{MemoryWorkQueue, QueueConfig, WorkQueue};
    use mediaduct_storage::{BlobStore, MemoryBlobStore};

    #[test]
    fn poll_backoff_grows_and_caps() {
        assert_eq!(compute_poll_backoff(1), Duration::from_secs(1));
        assert_eq!(compute_poll_backoff(2), Duration::from_secs(2));
        assert_eq!(compute_poll_backoff(4), Duration::from_secs(8));
        assert_eq!(compute_poll_backoff(9), Duration::from_secs(256));
        assert_eq!(compute_poll_backoff(10), Duration::from_secs(300));
        assert_eq!(compute_poll_backoff(60), Duration::from_secs(300));
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 40, 70]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn pool_processes_queued_media() {
        let store = Arc::new(MemoryMetadataStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new(QueueConfig::default()));

        let item = MediaItem::new("photo.png", "image/png").unwrap();
        store.create(&item).await.unwrap();
        blobs
            .put(&item.original_key, Bytes::from(png_bytes(40, 30)), "image/png")
            .await
            .unwrap();
        queue.send(&WorkMessage::for_item(&item)).await.unwrap();

        let config = WorkerConfig {
            max_workers: 2,
            poll_wait: Duration::from_millis(20),
            ..WorkerConfig::default()
        };
        let processor = Arc::new(Processor::new(
            store.clone(),
            blobs.clone(),
            queue.clone(),
            Arc::new(ImageTransformer::default()),
            config.clone(),
        ));
        let pool = WorkerPool::new(processor, config);

        let mut status = MediaStatus::Pending;
        for _ in 0..200 {
            status = store.get(item.id).await.unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, MediaStatus::Completed);

        pool.shutdown().await;
    }
}
