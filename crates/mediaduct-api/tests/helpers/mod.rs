//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p mediaduct-api`. Everything rides
//! the in-memory backends, so no external services are required. The server
//! runs with the worker pool disabled; tests that need processing drive a
//! [`Processor`] by hand against the same backends.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum_test::TestServer;
use mediaduct_api::setup::routes;
use mediaduct_api::state::AppState;
use mediaduct_core::config::{BaseConfig, Config, DataBackend, PipelineConfig};
use mediaduct_core::StorageBackend;
use mediaduct_db::MemoryMetadataStore;
use mediaduct_processing::ImageTransformer;
use mediaduct_queue::{MemoryWorkQueue, QueueConfig};
use mediaduct_storage::MemoryBlobStore;
use mediaduct_worker::{Processor, WorkerConfig};

/// Test application: server plus direct handles on the in-memory backends.
pub struct TestApp {
    pub server: TestServer,
    pub metadata: Arc<MemoryMetadataStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub queue: Arc<MemoryWorkQueue>,
    pub config: Config,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Processor wired to the same backends as the server, for driving
    /// queued work by hand.
    pub fn processor(&self) -> Processor {
        Processor::new(
            self.metadata.clone(),
            self.blobs.clone(),
            self.queue.clone(),
            Arc::new(ImageTransformer::new(
                self.config.processed_max_width(),
                self.config.processed_max_height(),
                self.config.processed_jpeg_quality(),
            )),
            WorkerConfig::from_config(&self.config),
        )
    }
}

/// Setup test app on in-memory backends.
pub async fn setup_test_app() -> TestApp {
    let config = create_test_config();

    let metadata = Arc::new(MemoryMetadataStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let queue = Arc::new(MemoryWorkQueue::new(QueueConfig::from_config(&config)));

    let state = Arc::new(AppState {
        config: config.clone(),
        metadata: metadata.clone(),
        blobs: blobs.clone(),
        queue: queue.clone(),
        worker: None,
        is_production: false,
    });

    let app = routes::setup_routes(&config, state)
        .await
        .expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        metadata,
        blobs,
        queue,
        config,
    }
}

fn create_test_config() -> Config {
    let base = BaseConfig {
        server_port: 4000,
        cors_origins: vec!["*".to_string()],
        db_max_connections: 5,
        db_timeout_seconds: 30,
        environment: "test".to_string(),
        log_json: false,
    };
    Config(Box::new(PipelineConfig {
        base,
        data_backend: DataBackend::Memory,
        database_url: None,
        storage_backend: Some(StorageBackend::Memory),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        local_storage_path: None,
        local_storage_base_url: None,
        grant_ttl_secs: 3600,
        max_body_bytes: 64 * 1024,
        queue_visibility_timeout_secs: 30,
        queue_max_receive_count: 3,
        worker_enabled: false,
        worker_max_workers: 2,
        worker_poll_interval_ms: 50,
        processed_max_width: 1920,
        processed_max_height: 1080,
        processed_jpeg_quality: 85,
    }))
}
