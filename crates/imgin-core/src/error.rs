//! Error types for imgin-core operations.
//!
//! Covers the failures that can be detected from geometry and type
//! information alone, before any codec is involved:
//!
//! - requesting a pixel buffer of a non-pixel type
//! - geometry whose buffer size does not fit in memory arithmetic
//! - descriptors that violate the depth/channel invariants
//! - conversion into a buffer that is too small
//! - buffers the allocator cannot provide
//!
//! # Dependencies
//!
//! - [`thiserror`] - For derive macro error implementation

use crate::BaseType;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by spec validation, buffer dispatch and sample conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested type cannot hold pixel data.
    ///
    /// Raised at dispatch time, before any decode work starts.
    ///
    /// ```rust
    /// use imgin_core::{BaseType, Error};
    ///
    /// let err = Error::UnsupportedType(BaseType::String);
    /// assert_eq!(err.to_string(), "unsupported pixel type: string");
    /// ```
    #[error("unsupported pixel type: {0}")]
    UnsupportedType(BaseType),

    /// Image descriptor violates an invariant.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Element count or byte size overflows `usize`.
    #[error("buffer size overflow: {0}")]
    BufferSizeOverflow(String),

    /// Source data does not fit the destination buffer.
    #[error("buffer size mismatch: need {needed} elements, have {available}")]
    BufferSizeMismatch {
        /// Elements required by the operation
        needed: usize,
        /// Elements available in the destination
        available: usize,
    },

    /// The allocator could not provide a buffer of this size.
    ///
    /// Geometry read from a corrupt header can ask for far more memory than
    /// exists; this is reported instead of aborting the process.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Requested size in bytes (saturated)
        bytes: usize,
    },
}
