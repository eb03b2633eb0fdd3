//! Mediaduct Storage Library
//!
//! This crate provides the blob store abstraction and its backends. The
//! ingestion handler uses it to mint upload grants, the worker to fetch
//! originals and write processed renditions, and the status handler to mint
//! download grants.
//!
//! # Storage key format
//!
//! - **Originals**: `{media_id}/{file_name}`
//! - **Processed renditions**: `processed/{media_id}/{file_name}`
//!
//! Keys must not contain `..` or a leading `/`. Key validation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use mediaduct_core::StorageBackend;
pub use memory::MemoryBlobStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use traits::{BlobStore, StorageError, StorageResult};
