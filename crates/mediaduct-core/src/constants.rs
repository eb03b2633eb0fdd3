//! Application-wide constants.

/// Lifetime of presigned upload and download grants, in seconds.
pub const GRANT_TTL_SECS: u64 = 3600;

/// Key prefix under which processed renditions are written.
pub const PROCESSED_KEY_PREFIX: &str = "processed";

/// Deliveries of a message beyond this count are routed to the dead-letter
/// channel instead of being handed to a worker.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;

/// Default lease duration for an in-flight delivery, in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;

/// Maximum accepted file name length (bytes).
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Maximum accepted content type length (bytes).
pub const MAX_CONTENT_TYPE_LEN: usize = 127;

/// Bounding box for processed renditions (width, height).
pub const PROCESSED_MAX_DIMENSIONS: (u32, u32) = (1920, 1080);

/// JPEG quality used when re-encoding processed renditions.
pub const PROCESSED_JPEG_QUALITY: u8 = 85;
