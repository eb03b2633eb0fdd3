//! End-to-end API tests for the ingestion flow.
//!
//! Run with: `cargo test -p mediaduct-api --test media_flow_test`

mod helpers;

use std::time::Duration;

use bytes::Bytes;
use helpers::{fixtures, setup_test_app};
use mediaduct_core::MediaStatus;
use mediaduct_db::MetadataStore;
use mediaduct_queue::WorkQueue;
use mediaduct_storage::BlobStore;
use mediaduct_worker::ProcessOutcome;
use uuid::Uuid;

#[tokio::test]
async fn upload_issues_grant_and_enqueues() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "cat.png",
            "contentType": "image/png"
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(true));

    let data = body.get("data").expect("data object");
    let media_id = Uuid::parse_str(
        data.get("mediaId")
            .and_then(|v| v.as_str())
            .expect("Expected 'mediaId' in upload response"),
    )
    .expect("Invalid UUID in upload response");

    let upload_url = data
        .get("uploadUrl")
        .and_then(|v| v.as_str())
        .expect("uploadUrl");
    assert!(upload_url.starts_with("memory:///"));
    assert!(upload_url.contains(&media_id.to_string()));
    assert_eq!(data.get("expiresIn").and_then(|v| v.as_u64()), Some(3600));

    // Record exists as PENDING and the work message is already queued.
    let item = app
        .metadata
        .get(media_id)
        .await
        .expect("metadata get")
        .expect("item exists");
    assert_eq!(item.status, MediaStatus::Pending);
    assert_eq!(item.original_key, format!("{}/cat.png", media_id));

    let delivery = app
        .queue
        .receive(Duration::ZERO)
        .await
        .expect("receive")
        .expect("message queued");
    assert_eq!(delivery.message.media_id, media_id);
}

#[tokio::test]
async fn repeated_uploads_get_distinct_ids() {
    let app = setup_test_app().await;
    let client = app.client();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = client
            .post("/media/upload")
            .json(&serde_json::json!({
                "fileName": "same-name.png",
                "contentType": "image/png"
            }))
            .await;
        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        ids.push(
            body.pointer("/data/mediaId")
                .and_then(|v| v.as_str())
                .expect("mediaId")
                .to_string(),
        );
    }
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let app = setup_test_app().await;
    let client = app.client();

    // Missing contentType fails JSON extraction with the error envelope.
    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({ "fileName": "cat.png" }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        body.pointer("/error/code").and_then(|v| v.as_str()),
        Some("VALIDATION_ERROR")
    );

    // Traversal in the file name is rejected by domain validation.
    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "../etc/passwd",
            "contentType": "image/png"
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    // Content type must at least look like type/subtype.
    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "cat.png",
            "contentType": "not-a-type"
        }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unknown_media_id_is_404() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .get(&format!("/media/{}/status", Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        body.pointer("/error/code").and_then(|v| v.as_str()),
        Some("NOT_FOUND")
    );
}

#[tokio::test]
async fn malformed_media_id_is_400() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/media/not-a-uuid/status").await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(
        body.pointer("/error/code").and_then(|v| v.as_str()),
        Some("VALIDATION_ERROR")
    );
}

#[tokio::test]
async fn pending_item_has_no_processed_url() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "slow.png",
            "contentType": "image/png"
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let media_id = body
        .pointer("/data/mediaId")
        .and_then(|v| v.as_str())
        .expect("mediaId")
        .to_string();

    let response = client.get(&format!("/media/{}/status", media_id)).await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let data = body.get("data").expect("data object");
    assert_eq!(data.get("status").and_then(|v| v.as_str()), Some("PENDING"));
    assert!(data.get("originalUrl").and_then(|v| v.as_str()).is_some());
    assert!(data.get("processedUrl").is_none());
    assert!(data.get("processedAt").is_none());
}

/// Upload registration, direct blob write, queued processing, and status
/// retrieval against the same backends the server uses.
#[tokio::test]
async fn full_pipeline_round_trip() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "vacation.png",
            "contentType": "image/png"
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let media_id = Uuid::parse_str(
        body.pointer("/data/mediaId")
            .and_then(|v| v.as_str())
            .expect("mediaId"),
    )
    .expect("valid UUID");

    // The client-side PUT against the grant: write the original directly.
    let original_key = format!("{}/vacation.png", media_id);
    app.blobs
        .put(
            &original_key,
            Bytes::from(fixtures::png_bytes(2400, 1200)),
            "image/png",
        )
        .await
        .expect("store original");

    // Drive the queued work message through one processing attempt.
    let delivery = app
        .queue
        .receive(Duration::ZERO)
        .await
        .expect("receive")
        .expect("message queued");
    let outcome = app.processor().handle_delivery(delivery).await;
    assert_eq!(outcome, ProcessOutcome::Completed);

    let response = client.get(&format!("/media/{}/status", media_id)).await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let data = body.get("data").expect("data object");
    assert_eq!(
        data.get("status").and_then(|v| v.as_str()),
        Some("COMPLETED")
    );
    assert!(data.get("processedAt").is_some());

    let processed_url = data
        .get("processedUrl")
        .and_then(|v| v.as_str())
        .expect("processedUrl");
    assert!(processed_url.contains("processed/"));

    // The rendition is a JPEG stored under the derived processed key.
    let processed_key = format!("processed/{}/vacation.png", media_id);
    let rendition = app.blobs.get(&processed_key).await.expect("processed blob");
    assert_eq!(
        image::guess_format(&rendition).expect("guess format"),
        image::ImageFormat::Jpeg
    );
    assert_eq!(
        app.blobs.content_type_of(&processed_key).as_deref(),
        Some("image/jpeg")
    );
}
