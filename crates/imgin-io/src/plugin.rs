//! Codec plugin boundary.
//!
//! The reader front end never parses file bytes itself. It selects an
//! [`ImageInputPlugin`] (see [`PluginRegistry`](crate::PluginRegistry)), lets
//! it fill in an [`ImageSpec`], and asks it for native pixel data one scanline
//! or one tile at a time. Type conversion, bounds checks, progress reporting
//! and error recording all happen on the reader side.
//!
//! # Implementing a plugin
//!
//! ```rust,ignore
//! use imgin_io::{Feature, ImageInputPlugin, IoResult};
//!
//! struct MyInput { /* decoder state */ }
//!
//! impl ImageInputPlugin for MyInput {
//!     fn format_name(&self) -> &'static str { "myformat" }
//!     fn valid_file(&self, path: &Path) -> bool { /* magic check */ }
//!     fn supports(&self, feature: Feature) -> bool { false }
//!     // open / close / seek / read_native_scanline ...
//! }
//! ```
//!
//! # Coordinates and data
//!
//! Scanline and tile coordinates passed to a plugin are relative to the data
//! window origin and have already been validated against the current spec.
//! Native data is written as native-endian bytes of `spec.format`, pixel
//! interleaved, with no padding between rows.

use crate::IoResult;
use imgin_core::ImageSpec;
use std::fmt;
use std::path::Path;

/// Capability flags a plugin can advertise.
///
/// The string vocabulary accepted by
/// [`ImageInput::supports`](crate::ImageInput::supports) maps onto these
/// through [`Feature::from_name`]. Names outside the vocabulary are not an
/// error, they are simply unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Pixels are stored in tiles and can be read tile by tile.
    Tiles,
    /// Subimages can be reached without re-reading earlier ones.
    RandomAccess,
    /// A file may contain more than one subimage.
    MultiImage,
    /// Subimages may carry MIP levels.
    MipMap,
    /// Volumetric (depth > 1) images.
    Volumes,
    /// Scanlines or tiles may be rewritten in place.
    Rewrite,
    /// Per-channel native formats.
    ChannelFormats,
    /// Display window distinct from the data window.
    DisplayWindow,
    /// Non-zero data window origin.
    Origin,
    /// Negative data window origin.
    NegativeOrigin,
    /// Multiple samples per pixel.
    DeepData,
    /// Arbitrary rectangle reads.
    Rectangles,
    /// Reading from an in-memory proxy instead of a path.
    IoProxy,
}

impl Feature {
    /// Every feature, in vocabulary order.
    pub const ALL: [Feature; 13] = [
        Self::Tiles,
        Self::RandomAccess,
        Self::MultiImage,
        Self::MipMap,
        Self::Volumes,
        Self::Rewrite,
        Self::ChannelFormats,
        Self::DisplayWindow,
        Self::Origin,
        Self::NegativeOrigin,
        Self::DeepData,
        Self::Rectangles,
        Self::IoProxy,
    ];

    /// Vocabulary name of this feature.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tiles => "tiles",
            Self::RandomAccess => "random_access",
            Self::MultiImage => "multiimage",
            Self::MipMap => "mipmap",
            Self::Volumes => "volumes",
            Self::Rewrite => "rewrite",
            Self::ChannelFormats => "channelformats",
            Self::DisplayWindow => "displaywindow",
            Self::Origin => "origin",
            Self::NegativeOrigin => "negativeorigin",
            Self::DeepData => "deepdata",
            Self::Rectangles => "rectangles",
            Self::IoProxy => "ioproxy",
        }
    }

    /// Looks up a feature by vocabulary name (exact, lowercase).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-format decode backend.
///
/// One plugin instance holds at most one open file. Instances are created
/// closed by the registry and opened by the reader.
pub trait ImageInputPlugin: Send {
    /// Registry name of the format.
    fn format_name(&self) -> &'static str;

    /// Cheap check whether `path` looks like this format.
    ///
    /// Must not report false for well-formed files; may report true for
    /// files that later fail to open.
    fn valid_file(&self, path: &Path) -> bool;

    /// Capability query.
    fn supports(&self, feature: Feature) -> bool;

    /// Opens `path` positioned at subimage 0, MIP level 0.
    ///
    /// On error the plugin must be left closed.
    fn open(&mut self, path: &Path) -> IoResult<ImageSpec>;

    /// Releases the open file. Closing a closed plugin is a no-op.
    fn close(&mut self) -> IoResult<()>;

    /// Current subimage index.
    fn current_subimage(&self) -> usize;

    /// Current MIP level index.
    fn current_miplevel(&self) -> usize;

    /// Moves to `(subimage, miplevel)` and returns its spec.
    ///
    /// Plugins without random access emulate it internally. On error the
    /// plugin stays at its previous position.
    fn seek_subimage(&mut self, subimage: usize, miplevel: usize) -> IoResult<ImageSpec>;

    /// Decodes row `y` of slice `z` into `data` (`spec.row_bytes()` bytes).
    fn read_native_scanline(&mut self, y: u32, z: u32, data: &mut [u8]) -> IoResult<()>;

    /// Decodes the tile with origin `(x, y, z)` into `data` (`spec.tile_bytes()` bytes).
    ///
    /// Tiles overhanging the data window are padded with zeros.
    fn read_native_tile(&mut self, x: u32, y: u32, z: u32, data: &mut [u8]) -> IoResult<()> {
        let _ = (x, y, z, data);
        Err(crate::IoError::UnsupportedOperation(format!(
            "{} does not read tiles",
            self.format_name()
        )))
    }
}

impl fmt::Debug for dyn ImageInputPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInputPlugin")
            .field("format", &self.format_name())
            .field("subimage", &self.current_subimage())
            .field("miplevel", &self.current_miplevel())
            .finish()
    }
}
