//! Metadata store and work queue construction

use std::sync::Arc;

use anyhow::Result;
use mediaduct_core::config::{Config, DataBackend};
use mediaduct_db::{MemoryMetadataStore, MetadataStore, PgMetadataStore};
use mediaduct_queue::{MemoryWorkQueue, PgWorkQueue, QueueConfig, WorkQueue};

use super::database;

/// Build the metadata store and work queue for the configured backend.
///
/// Both ride the same backend: the Postgres pair shares one pool so a
/// status transition and its queue operation hit the same database, and
/// the in-memory pair exists for tests and single-process setups.
pub async fn setup_stores(
    config: &Config,
) -> Result<(Arc<dyn MetadataStore>, Arc<dyn WorkQueue>)> {
    let queue_config = QueueConfig::from_config(config);
    match config.data_backend() {
        DataBackend::Postgres => {
            let pool = database::setup_database(config).await?;
            let metadata: Arc<dyn MetadataStore> = Arc::new(PgMetadataStore::new(pool.clone()));
            let queue: Arc<dyn WorkQueue> = Arc::new(PgWorkQueue::new(pool, queue_config));
            Ok((metadata, queue))
        }
        DataBackend::Memory => {
            tracing::warn!("Using in-memory metadata and queue backends; state is lost on restart");
            let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
            let queue: Arc<dyn WorkQueue> = Arc::new(MemoryWorkQueue::new(queue_config));
            Ok((metadata, queue))
        }
    }
}
