use mediaduct_core::AppError;
use thiserror::Error;

/// Processing failures. All variants are terminal for the pipeline:
/// the same bytes produce the same failure on every retry.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The payload is not one of the supported image formats, or no
    /// format could be recognized at all.
    #[error("unsupported content: {0}")]
    Unsupported(String),

    /// The payload carries a supported magic number but cannot be
    /// decoded (truncated or corrupt).
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Unsupported(msg) => AppError::UnsupportedType(msg),
            ProcessingError::Decode(msg) => {
                AppError::UnsupportedType(format!("image could not be decoded: {}", msg))
            }
            ProcessingError::Encode(msg) => {
                AppError::Internal(format!("image encoding failed: {}", msg))
            }
        }
    }
}
