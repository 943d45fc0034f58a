//! # imgin-core
//!
//! Core types for format-agnostic image input.
//!
//! This crate holds the passive pieces of the reader front end, the parts
//! that need no codec:
//!
//! - [`BaseType`] - Numeric type of a channel sample
//! - [`ImageSpec`] - Geometry, tiling and channel layout of a subimage/MIP level
//! - [`PixelBuffer`] - Type-tagged output buffer, sized from a spec
//! - [`convert`] - Native bytes → typed buffer conversion
//!
//! ## Crate Structure
//!
//! ```text
//! imgin-core (this crate)
//!    ^
//!    |
//!    +-- imgin-io (ImageInput, codec plugins, registry)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use imgin_core::{BaseType, ImageSpec, PixelBuffer};
//!
//! let spec = ImageSpec::new(64, 32, 3, BaseType::UInt8);
//! let buf = PixelBuffer::for_image(&spec, BaseType::Float)?;
//! assert_eq!(buf.len(), 64 * 32 * 3);
//! # Ok::<(), imgin_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod buffer;
pub mod convert;
pub mod error;
pub mod format;
pub mod spec;

pub use buffer::PixelBuffer;
pub use error::{Error, Result};
pub use format::BaseType;
pub use spec::{AttrValue, ImageSpec};

/// Prelude module for convenient imports.
///
/// ```
/// use imgin_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::buffer::PixelBuffer;
    pub use crate::error::{Error, Result};
    pub use crate::format::BaseType;
    pub use crate::spec::{AttrValue, ImageSpec};
}
