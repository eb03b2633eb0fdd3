use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediaduct_core::{AppError, MediaItem, MediaStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors from the metadata store
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("media item {0} already exists")]
    Duplicate(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata backend error: {0}")]
    BackendError(String),
}

impl MetadataError {
    /// Whether retrying the operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MetadataError::Duplicate(_) => false,
            MetadataError::Database(_) => true,
            MetadataError::BackendError(_) => true,
        }
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Duplicate(id) => {
                AppError::Validation(format!("media item {} already exists", id))
            }
            other => AppError::Internal(format!("metadata store error: {}", other)),
        }
    }
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Precondition for a conditional update.
///
/// The update applies only when the item's current status is one of
/// `any_of` and, when `attempts_below` is set, its attempts counter is
/// strictly below that ceiling.
#[derive(Debug, Clone, Default)]
pub struct StatusExpectation {
    pub any_of: Vec<MediaStatus>,
    pub attempts_below: Option<i32>,
}

impl StatusExpectation {
    pub fn one_of(statuses: impl Into<Vec<MediaStatus>>) -> Self {
        Self {
            any_of: statuses.into(),
            attempts_below: None,
        }
    }

    pub fn attempts_below(mut self, ceiling: i32) -> Self {
        self.attempts_below = Some(ceiling);
        self
    }
}

/// Field changes applied by a conditional update.
///
/// `processed_key` and `processed_at` only overwrite when set; `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone)]
pub struct MediaPatch {
    pub status: MediaStatus,
    pub processed_key: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub bump_attempts: bool,
}

impl MediaPatch {
    /// Claim an item for processing: move to PROCESSING and count the attempt.
    pub fn begin_attempt() -> Self {
        Self {
            status: MediaStatus::Processing,
            processed_key: None,
            processed_at: None,
            bump_attempts: true,
        }
    }

    /// Record a successful attempt with the derived output key.
    pub fn completed(processed_key: String) -> Self {
        Self {
            status: MediaStatus::Completed,
            processed_key: Some(processed_key),
            processed_at: Some(Utc::now()),
            bump_attempts: false,
        }
    }

    /// Record a permanent failure.
    pub fn failed() -> Self {
        Self {
            status: MediaStatus::Failed,
            processed_key: None,
            processed_at: Some(Utc::now()),
            bump_attempts: false,
        }
    }

    /// Hand a claimed item back for a later retry.
    pub fn release() -> Self {
        Self {
            status: MediaStatus::Pending,
            processed_key: None,
            processed_at: None,
            bump_attempts: false,
        }
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The precondition held; carries the item as stored after the patch.
    Applied(MediaItem),
    /// The precondition did not hold (or the item does not exist).
    /// The stored record is unchanged.
    Conflict,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Persistence for media item metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new item. Fails with [`MetadataError::Duplicate`] when the
    /// id is already present.
    async fn create(&self, item: &MediaItem) -> MetadataResult<()>;

    /// Fetch an item by id.
    async fn get(&self, id: Uuid) -> MetadataResult<Option<MediaItem>>;

    /// Atomically apply `patch` when `expect` holds against the stored row.
    ///
    /// A missing item reports [`UpdateOutcome::Conflict`]; only genuine
    /// backend failures surface as errors.
    async fn conditional_update(
        &self,
        id: Uuid,
        expect: StatusExpectation,
        patch: MediaPatch,
    ) -> MetadataResult<UpdateOutcome>;
}
