//! Domain models shared across the pipeline

pub mod media;
pub mod message;

pub use media::{MediaItem, MediaStatus};
pub use message::WorkMessage;
