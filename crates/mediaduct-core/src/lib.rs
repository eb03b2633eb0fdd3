//! Mediaduct Core Library
//!
//! This crate provides the domain model, error taxonomy, configuration, and
//! request validation shared across all Mediaduct components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, DataBackend, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{MediaItem, MediaStatus, WorkMessage};
pub use storage_types::StorageBackend;
pub use validation::{validate_content_type, validate_file_name};
