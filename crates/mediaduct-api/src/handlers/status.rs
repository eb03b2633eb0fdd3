use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::response::{success, SuccessResponse};
use crate::state::AppState;
use mediaduct_core::{AppError, MediaStatus};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub media_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Short-lived download URL for the uploaded original
    pub original_url: String,
    /// Short-lived download URL for the processed rendition; present only
    /// once the item is COMPLETED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
}

/// Report pipeline progress for one media item.
///
/// Download URLs are minted fresh on every call so a client polling an item
/// never holds an expired grant.
#[utoipa::path(
    get,
    path = "/media/{media_id}/status",
    tag = "media",
    params(
        ("media_id" = String, Path, description = "Media item id (UUID)")
    ),
    responses(
        (status = 200, description = "Current status", body = SuccessResponse<StatusData>),
        (status = 400, description = "Malformed media id", body = ErrorResponse),
        (status = 404, description = "Unknown media id", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(media_id = %media_id, operation = "get_status"))]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let id = Uuid::parse_str(&media_id).map_err(AppError::from)?;

    let item = state
        .metadata
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

    let ttl = Duration::from_secs(state.config.grant_ttl_secs());
    let original_url = state
        .blobs
        .get_presigned_url(&item.original_key, ttl)
        .await?;

    let processed_url = match (&item.status, &item.processed_key) {
        (MediaStatus::Completed, Some(key)) => {
            Some(state.blobs.get_presigned_url(key, ttl).await?)
        }
        _ => None,
    };

    Ok(success(
        "Media status retrieved",
        StatusData {
            media_id: item.id,
            file_name: item.file_name,
            content_type: item.content_type,
            status: item.status,
            created_at: item.created_at,
            processed_at: item.processed_at,
            original_url,
            processed_url,
        },
    ))
}
