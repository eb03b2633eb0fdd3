use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::response::{success, SuccessResponse};
use crate::state::AppState;
use mediaduct_core::{AppError, MediaItem, WorkMessage};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Object name the client intends to upload, e.g. "photo.jpg"
    #[validate(length(
        min = 1,
        max = 255,
        message = "fileName must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// Declared MIME type. Advisory; the worker sniffs the actual bytes.
    #[validate(length(
        min = 1,
        max = 127,
        message = "contentType must be between 1 and 127 characters"
    ))]
    pub content_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub media_id: Uuid,
    /// Presigned PUT URL the client uploads the original bytes to
    pub upload_url: String,
    /// Grant lifetime in seconds
    pub expires_in: u64,
}

/// Register a media item and issue a direct-upload grant.
///
/// The record is created PENDING and the work message is enqueued before the
/// client has uploaded anything; the worker treats a missing original blob as
/// "not uploaded yet" and retries.
#[utoipa::path(
    post,
    path = "/media/upload",
    tag = "media",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Upload grant issued", body = SuccessResponse<UploadData>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 503, description = "Storage or queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(
        file_name = %request.file_name,
        content_type = %request.content_type,
        operation = "request_upload"
    )
)]
pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let item = MediaItem::new(&request.file_name, &request.content_type)?;

    state.metadata.create(&item).await?;

    let expires_in = state.config.grant_ttl_secs();
    let upload_url = state
        .blobs
        .presigned_put_url(
            &item.original_key,
            &item.content_type,
            Duration::from_secs(expires_in),
        )
        .await?;

    state.queue.send(&WorkMessage::for_item(&item)).await?;

    tracing::info!(media_id = %item.id, key = %item.original_key, "Registered upload");

    Ok(success(
        "Upload URL issued",
        UploadData {
            media_id: item.id,
            upload_url,
            expires_in,
        },
    ))
}
