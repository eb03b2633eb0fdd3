use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Envelope for every successful API response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse<T> {
    /// Always `true` on this branch.
    pub success: bool,
    /// Human-readable summary of what happened.
    pub message: String,
    /// Operation-specific payload.
    pub data: T,
}

/// Wraps a payload in the standard success envelope.
pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        success: true,
        message: message.into(),
        data,
    })
}
