//! Health, documentation, and routing-surface tests.
//!
//! Run with: `cargo test -p mediaduct-api --test health_test`

mod helpers;

use std::time::Duration;

use helpers::setup_test_app;
use mediaduct_queue::WorkQueue;

#[tokio::test]
async fn liveness_reports_alive() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("alive"));
}

#[tokio::test]
async fn readiness_reports_all_backends() {
    let app = setup_test_app().await;
    let response = app.client().get("/health/ready").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(body.get("metadata").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(body.get("storage").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(body.get("queue").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(body.get("deadLetterCount").and_then(|v| v.as_u64()), Some(0));
}

#[tokio::test]
async fn readiness_surfaces_dead_letters_without_going_unready() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/media/upload")
        .json(&serde_json::json!({
            "fileName": "doomed.png",
            "contentType": "image/png"
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let delivery = app
        .queue
        .receive(Duration::ZERO)
        .await
        .expect("receive")
        .expect("message queued");
    app.queue.reject(&delivery.lease).await.expect("reject");

    let response = client.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ready"));
    assert_eq!(body.get("deadLetterCount").and_then(|v| v.as_u64()), Some(1));
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let app = setup_test_app().await;
    let response = app.client().get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(
        body.pointer("/info/title").and_then(|v| v.as_str()),
        Some("Mediaduct API")
    );
    let paths = body.get("paths").expect("paths object");
    assert!(paths.get("/media/upload").is_some());
    assert!(paths.get("/media/{media_id}/status").is_some());
}

#[tokio::test]
async fn unknown_route_gets_enveloped_404() {
    let app = setup_test_app().await;
    let response = app.client().get("/nope").await;

    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        body.pointer("/error/code").and_then(|v| v.as_str()),
        Some("HTTP_404")
    );
}
