use std::sync::Arc;

use mediaduct_core::config::Config;
use mediaduct_db::MetadataStore;
use mediaduct_queue::WorkQueue;
use mediaduct_storage::BlobStore;
use mediaduct_worker::WorkerPool;

/// Shared application state handed to every handler.
///
/// Cheap to clone: everything heavy sits behind an `Arc`. The worker
/// pool is present only when background processing runs in-process; the
/// server keeps the handle so shutdown can drain in-flight attempts.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub metadata: Arc<dyn MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub worker: Option<Arc<WorkerPool>>,
    pub is_production: bool,
}

fn _assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn _assert_app_state_send_sync() {
    _assert_send_sync::<AppState>();
}
