use async_trait::async_trait;
use mediaduct_core::constants::{DEFAULT_MAX_RECEIVE_COUNT, DEFAULT_VISIBILITY_TIMEOUT_SECS};
use mediaduct_core::{AppError, Config, WorkMessage};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the work queue
#[derive(Error, Debug)]
pub enum QueueError {
    /// The lease no longer refers to a claimed message. Raised when the
    /// visibility timeout lapsed and the message was returned or picked
    /// up by another consumer.
    #[error("lease expired or message no longer claimed")]
    LeaseExpired,

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("queue backend error: {0}")]
    BackendError(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueueError {
    /// Whether retrying the operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::LeaseExpired => false,
            QueueError::Encode(_) => false,
            QueueError::BackendError(_) => true,
            QueueError::Database(_) => true,
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Encode(msg) => AppError::Internal(format!("queue encode error: {}", msg)),
            QueueError::LeaseExpired => {
                AppError::Internal("queue lease expired unexpectedly".to_string())
            }
            other => AppError::QueueUnavailable(format!("queue error: {}", other)),
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Opaque claim on a delivered message. Required to ack, release, or
/// reject that delivery; stale tokens fail with [`QueueError::LeaseExpired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    pub(crate) message_id: i64,
    pub(crate) token: Uuid,
}

impl LeaseToken {
    pub fn message_id(&self) -> i64 {
        self.message_id
    }
}

/// A message handed to a consumer together with its lease.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: WorkMessage,
    pub lease: LeaseToken,
    /// How many times this message has been delivered, this delivery
    /// included. Starts at 1.
    pub receive_count: i32,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a claimed message stays invisible before it becomes
    /// claimable again.
    pub visibility_timeout: Duration,
    /// Deliveries allowed before a message is dead-lettered instead of
    /// redelivered.
    pub max_receive_count: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT as i32,
        }
    }
}

impl QueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            visibility_timeout: Duration::from_secs(config.queue_visibility_timeout_secs()),
            max_receive_count: config.queue_max_receive_count() as i32,
        }
    }
}

/// At-least-once work queue.
///
/// Delivery order between consumers is not guaranteed; consumers must be
/// idempotent against redelivery of already-handled messages.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a message for delivery.
    async fn send(&self, message: &WorkMessage) -> QueueResult<()>;

    /// Claim the next available message, waiting up to `wait` for one to
    /// become available. Returns `Ok(None)` when the wait elapses empty.
    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>>;

    /// Remove a claimed message permanently. Call only after the results
    /// of handling it are committed; a lapsed claim fails with
    /// [`QueueError::LeaseExpired`] and the message may be redelivered.
    async fn ack(&self, lease: &LeaseToken) -> QueueResult<()>;

    /// Return a claimed message to the queue for prompt redelivery,
    /// keeping its receive count.
    async fn release(&self, lease: &LeaseToken) -> QueueResult<()>;

    /// Move a claimed message to the dead-letter pool.
    async fn reject(&self, lease: &LeaseToken) -> QueueResult<()>;

    /// Number of dead-lettered messages.
    async fn dead_letter_count(&self) -> QueueResult<u64>;
}
