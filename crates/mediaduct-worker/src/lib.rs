//! Background processing for ingested media.
//!
//! The [`Processor`] drives a single delivery through the claim, transform
//! and commit steps; the [`WorkerPool`] pulls deliveries off the work queue
//! and fans them out to a bounded number of concurrent handlers.

pub mod config;
pub mod pool;
pub mod processor;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
pub use processor::{ProcessOutcome, Processor};
