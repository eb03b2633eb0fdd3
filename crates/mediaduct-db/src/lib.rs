//! Metadata persistence for media items.
//!
//! The [`MetadataStore`] trait is the single write path for item state.
//! All status transitions go through [`MetadataStore::conditional_update`],
//! a compare-and-swap keyed on the current status (and optionally an
//! attempts ceiling), so concurrent workers and redeliveries can never
//! clobber a terminal record.

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use traits::{
    MediaPatch, MetadataError, MetadataResult, MetadataStore, StatusExpectation, UpdateOutcome,
};
