//! Request field validation
//!
//! File names become blob-store key segments, so traversal sequences and
//! path separators are rejected outright rather than sanitized.

use crate::constants::{MAX_CONTENT_TYPE_LEN, MAX_FILE_NAME_LEN};
use crate::error::AppError;

/// Validate a client-supplied file name.
///
/// The file name is embedded verbatim in the original and processed blob
/// keys (`{id}/{fileName}`), so it must be a single path segment.
pub fn validate_file_name(file_name: &str) -> Result<(), AppError> {
    if file_name.is_empty() {
        return Err(AppError::Validation(
            "fileName must not be empty".to_string(),
        ));
    }
    if file_name.len() > MAX_FILE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "fileName exceeds {} bytes",
            MAX_FILE_NAME_LEN
        )));
    }
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(AppError::Validation(
            "fileName must not contain path separators".to_string(),
        ));
    }
    if file_name.contains("..") {
        return Err(AppError::Validation(
            "fileName must not contain traversal sequences".to_string(),
        ));
    }
    if file_name.chars().any(|c| c.is_control()) {
        return Err(AppError::Validation(
            "fileName must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a client-declared content type (`type/subtype`).
///
/// The declared type is advisory; the worker re-checks the actual bytes.
/// This check only rejects strings that cannot be a media type at all.
pub fn validate_content_type(content_type: &str) -> Result<(), AppError> {
    if content_type.is_empty() {
        return Err(AppError::Validation(
            "contentType must not be empty".to_string(),
        ));
    }
    if content_type.len() > MAX_CONTENT_TYPE_LEN {
        return Err(AppError::Validation(format!(
            "contentType exceeds {} bytes",
            MAX_CONTENT_TYPE_LEN
        )));
    }
    let Some((main, sub)) = content_type.split_once('/') else {
        return Err(AppError::Validation(
            "contentType must be of the form type/subtype".to_string(),
        ));
    };
    if main.is_empty() || sub.is_empty() {
        return Err(AppError::Validation(
            "contentType must be of the form type/subtype".to_string(),
        ));
    }
    if content_type
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AppError::Validation(
            "contentType must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
