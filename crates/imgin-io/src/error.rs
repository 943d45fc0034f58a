//! Error types for image input.
//!
//! Every failure of the reader is one of these kinds. The reader also keeps
//! the `Display` text of the most recent failure, see
//! [`ImageInput::last_error`](crate::ImageInput::last_error).

use std::io;
use thiserror::Error;

/// Image input error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation requires an open reader.
    #[error("image input is not open")]
    NotOpen,

    /// No plugin recognizes the file.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid, truncated or corrupted file.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Requested subimage/MIP level does not exist or could not be reached.
    #[error("seek failed: {0}")]
    SeekFailed(String),

    /// Scanline or tile coordinates outside the current data window.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Operation not available for this image or plugin.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Progress callback requested cancellation.
    #[error("read aborted by progress callback")]
    Aborted,

    /// Configured resource limit exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Spec, dispatch or conversion error.
    #[error(transparent)]
    Core(#[from] imgin_core::Error),
}

/// Result type for image input operations.
pub type IoResult<T> = Result<T, IoError>;
