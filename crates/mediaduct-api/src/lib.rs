//! HTTP surface for the media pipeline.
//!
//! Exposes upload-grant and status endpoints over axum, plus health and
//! OpenAPI routes. The binary in `main.rs` wires configuration, stores,
//! the optional in-process worker pool, and graceful shutdown together
//! through [`setup::initialize_app`].

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod response;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::HttpAppError;
pub use response::SuccessResponse;
pub use state::AppState;
