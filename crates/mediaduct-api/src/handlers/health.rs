//! Health check handlers and response types.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

use crate::state::AppState;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns status string "ready", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadinessResponse {
    pub status: String,
    pub metadata: String,
    pub storage: String,
    pub queue: String,
    /// Messages parked after exhausting their redelivery budget. Reported,
    /// not gated on: a non-empty dead-letter set does not make the service
    /// unready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_count: Option<u64>,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - metadata store, blob store, and work queue all answer.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut response = ReadinessResponse {
        status: "ready".to_string(),
        metadata: "unknown".to_string(),
        storage: "unknown".to_string(),
        queue: "unknown".to_string(),
        dead_letter_count: None,
    };

    let metadata = state.metadata.clone();
    response.metadata = run_check(
        TIMEOUT,
        async move { metadata.get(Uuid::nil()).await.map(drop) },
        "not_ready",
    )
    .await;

    // Probe key never exists; only reachability of the backend matters.
    let blobs = state.blobs.clone();
    response.storage = run_check(
        TIMEOUT,
        async move {
            blobs
                .exists("health-check-non-existent-key")
                .await
                .map(drop)
        },
        "not_ready",
    )
    .await;

    response.queue = match tokio::time::timeout(TIMEOUT, state.queue.dead_letter_count()).await {
        Ok(Ok(count)) => {
            response.dead_letter_count = Some(count);
            "ready".to_string()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Queue readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Queue readiness check timed out");
            "timeout".to_string()
        }
    };

    let overall_ready = response.metadata == "ready"
        && response.storage == "ready"
        && response.queue == "ready";
    if !overall_ready {
        response.status = "not_ready".to_string();
    }

    let status_code = if overall_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
