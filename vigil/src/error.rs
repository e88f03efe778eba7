// THEORY:
// A single error type is shared by every layer of the engine. Each variant maps
// onto one of the three failure classes the engine distinguishes:
// - lookup misses (`NotFound`), which are caller contract violations;
// - I/O and image failures, which abort only the operation that hit them;
// - malformed persisted data, which is skipped record by record.
// Nothing in the engine retries.

use thiserror::Error;

/// Common result type for engine operations.
pub type Result<T> = std::result::Result<T, VigilError>;

#[derive(Debug, Error)]
pub enum VigilError {
    /// An identity was queried that the registry never minted or has already evicted.
    #[error("tracked object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The alert log parsed as JSON but its root is not an array.
    #[error("malformed alert log: {0}")]
    MalformedDocument(String),

    /// A single alert log entry could not be turned into a record.
    #[error("malformed alert record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}
