use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::PROCESSED_KEY_PREFIX;
use crate::error::AppError;
use crate::validation::{validate_content_type, validate_file_name};

/// Lifecycle state of a media item.
///
/// Wire representation uses the uppercase strings stored in the metadata
/// store and returned by the status endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MediaStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Failed)
    }

    /// Legal state-machine edges. `Processing -> Pending` is the retry
    /// release after a transient failure.
    pub fn can_transition_to(&self, next: MediaStatus) -> bool {
        matches!(
            (self, next),
            (MediaStatus::Pending, MediaStatus::Processing)
                | (MediaStatus::Processing, MediaStatus::Completed)
                | (MediaStatus::Processing, MediaStatus::Failed)
                | (MediaStatus::Processing, MediaStatus::Pending)
        )
    }
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaStatus::Pending => write!(f, "PENDING"),
            MediaStatus::Processing => write!(f, "PROCESSING"),
            MediaStatus::Completed => write!(f, "COMPLETED"),
            MediaStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MediaStatus::Pending),
            "PROCESSING" => Ok(MediaStatus::Processing),
            "COMPLETED" => Ok(MediaStatus::Completed),
            "FAILED" => Ok(MediaStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

/// Metadata record for one ingested media object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub file_name: String,
    /// Client-declared content type; advisory only, the worker sniffs the
    /// actual bytes before processing.
    pub content_type: String,
    pub original_key: String,
    /// Set exactly when `status` is `Completed`.
    pub processed_key: Option<String>,
    pub status: MediaStatus,
    /// Number of processing attempts started.
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    /// Create a PENDING record for a freshly registered upload.
    ///
    /// Validates both fields; the id and the original key are derived here
    /// so every component sees the same key layout.
    pub fn new(file_name: &str, content_type: &str) -> Result<Self, AppError> {
        validate_file_name(file_name)?;
        validate_content_type(content_type)?;

        let id = Uuid::new_v4();
        Ok(MediaItem {
            id,
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            original_key: Self::original_key_for(id, file_name),
            processed_key: None,
            status: MediaStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            processed_at: None,
        })
    }

    /// Blob key of the uploaded original: `{id}/{file_name}`.
    pub fn original_key_for(id: Uuid, file_name: &str) -> String {
        format!("{}/{}", id, file_name)
    }

    /// Deterministic blob key for the processed rendition:
    /// `processed/{id}/{file_name}`. Redelivered work overwrites the same
    /// key, which keeps the final write idempotent.
    pub fn processed_key_for(id: Uuid, file_name: &str) -> String {
        format!("{}/{}/{}", PROCESSED_KEY_PREFIX, id, file_name)
    }

    pub fn derived_processed_key(&self) -> String {
        Self::processed_key_for(self.id, &self.file_name)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when this item has no retry budget left under `max_attempts`.
    pub fn attempts_exhausted(&self, max_attempts: i32) -> bool {
        self.attempts >= max_attempts
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MediaItem {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(MediaItem {
            id: row.get("id"),
            file_name: row.get("file_name"),
            content_type: row.get("content_type"),
            original_key: row.get("original_key"),
            processed_key: row.get("processed_key"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media status: {}", e).into())
            })?,
            attempts: row.get("attempts"),
            created_at: row.get("created_at"),
            processed_at: row.get("processed_at"),
        })
    }
}
