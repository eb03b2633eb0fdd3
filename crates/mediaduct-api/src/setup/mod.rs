//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod database;
pub mod routes;
pub mod server;
pub mod stores;

use std::sync::Arc;

use anyhow::{Context, Result};
use mediaduct_core::config::Config;
use mediaduct_processing::ImageTransformer;
use mediaduct_worker::{Processor, WorkerConfig, WorkerPool};

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: &Config) -> Result<(axum::Router, Arc<AppState>)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config);

    tracing::info!("Configuration loaded and validated successfully");

    let (metadata, queue) = stores::setup_stores(config).await?;
    let blobs = mediaduct_storage::create_blob_store(config)
        .await
        .context("Failed to initialize blob storage")?;

    let worker = if config.worker_enabled() {
        let worker_config = WorkerConfig::from_config(config);
        let transformer = Arc::new(ImageTransformer::new(
            config.processed_max_width(),
            config.processed_max_height(),
            config.processed_jpeg_quality(),
        ));
        let processor = Arc::new(Processor::new(
            metadata.clone(),
            blobs.clone(),
            queue.clone(),
            transformer,
            worker_config.clone(),
        ));
        Some(Arc::new(WorkerPool::new(processor, worker_config)))
    } else {
        tracing::info!("In-process worker disabled; another consumer must drain the queue");
        None
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        metadata,
        blobs,
        queue,
        worker,
        is_production: config.is_production(),
    });

    let router = routes::setup_routes(config, state.clone()).await?;

    Ok((router, state))
}
