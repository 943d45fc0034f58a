//! # imgin-io
//!
//! Format-agnostic image input.
//!
//! [`ImageInput`] is the single reader type callers deal with. It picks a
//! codec plugin for a file, tracks the current subimage and MIP level, and
//! serves whole images, scanlines and tiles converted to the requested
//! [`BaseType`]. Codecs only ever produce native bytes.
//!
//! # Architecture
//!
//! - [`ImageInput`] - Reader front end: lifecycle, seeks, typed reads
//! - [`ImageInputPlugin`] - Trait each codec implements
//! - [`PluginRegistry`] - Name/extension/content based plugin selection
//! - [`InputConfig`] / [`Limits`] - Per-open options and resource caps
//! - [`ProgressCallback`] - Cancellable progress for whole-image reads
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use imgin_io::ImageInput;
//!
//! let mut input = ImageInput::open("plate.ppm")?;
//! let pixels = input.read_image()?;
//! let row = input.read_scanline(0, 0)?;
//! assert_eq!(&pixels[..row.len()], &row[..]);
//! # Ok::<(), imgin_io::IoError>(())
//! ```
//!
//! # Supported Formats
//!
//! | Format | Subimages | Tiles | MIP | Native types |
//! |--------|-----------|-------|-----|--------------|
//! | PNM (P5/P6/Pf/PF) | Yes (sequential) | No | No | 8, 16, 32f |
//! | HDR | No | No | No | 32f |
//! | TIFF | Yes | Yes | No | 8, 16, 32f |
//! | null | Yes | Yes | Yes | any |
//!
//! # Feature Flags
//!
//! - `pnm` - PNM/PFM support (default)
//! - `hdr` - Radiance HDR support (default)
//! - `tiff` - TIFF support via the `tiff` crate (default)
//! - `null` - Synthetic test images (default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod detect;
pub mod error;
pub mod input;
pub mod plugin;
pub mod progress;
pub mod registry;

#[cfg(feature = "hdr")]
pub mod hdr;
#[cfg(feature = "null")]
pub mod null;
#[cfg(feature = "pnm")]
pub mod pnm;
#[cfg(feature = "tiff")]
pub mod tiff;

pub use config::{InputConfig, Limits};
pub use error::{IoError, IoResult};
pub use input::ImageInput;
pub use plugin::{Feature, ImageInputPlugin};
pub use progress::ProgressCallback;
pub use registry::{PluginInfo, PluginRegistry};

pub use imgin_core::{BaseType, ImageSpec, PixelBuffer};
