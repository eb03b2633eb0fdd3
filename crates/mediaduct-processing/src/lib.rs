//! Content sniffing and image transformation.
//!
//! The worker never trusts the client-declared content type: the format
//! is sniffed from magic numbers, and anything outside the supported
//! image set is a terminal [`ProcessingError::Unsupported`]. Supported
//! inputs are decoded, resized to fit the configured bounding box
//! (never upscaled), and re-encoded as JPEG.

mod error;
mod sniff;
mod transform;

pub use error::ProcessingError;
pub use sniff::{sniff_format, SniffedFormat};
pub use transform::{ImageTransformer, MediaTransformer, ProcessedImage};
