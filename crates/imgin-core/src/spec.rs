//! Image specification.
//!
//! [`ImageSpec`] is the descriptor a codec fills in for the subimage/MIP level
//! a reader currently points at: geometry, tiling, channel layout and the
//! native per-channel type, plus free-form attributes.
//!
//! # Windows
//!
//! The data window is the region that holds pixels: origin `(x, y, z)` and
//! size `width x height x depth`. The display ("full") window is the frame it
//! belongs to. For most files both coincide and the origin is zero.
//!
//! ```text
//! full_x, full_y
//! ┌─────────────────────────────┐
//! │        Display Window       │
//! │   x, y                      │
//! │   ┌───────────────────┐     │
//! │   │    Data Window    │     │
//! │   └───────────────────┘     │
//! └─────────────────────────────┘
//! ```
//!
//! # Buffer sizes
//!
//! All element counts are computed with checked arithmetic, since every
//! factor comes from a file header.
//!
//! ```rust
//! use imgin_core::{BaseType, ImageSpec};
//!
//! let spec = ImageSpec::new(64, 32, 3, BaseType::UInt8);
//! assert_eq!(spec.image_values().unwrap(), 6144);
//! assert_eq!(spec.scanline_values().unwrap(), 192);
//! ```

use crate::error::{Error, Result};
use crate::format::BaseType;
use std::collections::HashMap;

/// Attribute value that can be stored in image metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Integer array
    IntArray(Vec<i64>),
    /// Float array
    FloatArray(Vec<f64>),
}

impl AttrValue {
    /// Returns this value as an integer, if applicable.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns this value as a float, if applicable.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as a string, if applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Geometry and channel layout of one subimage/MIP level.
///
/// A default-constructed spec is a placeholder: zero-sized, no channels and
/// an `Unknown` format. Readers overwrite placeholders wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// Data window origin X
    pub x: i32,
    /// Data window origin Y
    pub y: i32,
    /// Data window origin Z
    pub z: i32,
    /// Data window width in pixels
    pub width: u32,
    /// Data window height in pixels
    pub height: u32,
    /// Data window depth (1 for 2D images)
    pub depth: u32,
    /// Display window origin X
    pub full_x: i32,
    /// Display window origin Y
    pub full_y: i32,
    /// Display window origin Z
    pub full_z: i32,
    /// Display window width
    pub full_width: u32,
    /// Display window height
    pub full_height: u32,
    /// Display window depth
    pub full_depth: u32,
    /// Tile width (0 if untiled)
    pub tile_width: u32,
    /// Tile height (0 if untiled)
    pub tile_height: u32,
    /// Tile depth (0 or 1 for 2D tiles)
    pub tile_depth: u32,
    /// Number of channels per pixel
    pub nchannels: u32,
    /// Native per-channel type
    pub format: BaseType,
    /// Channel names, one per channel
    pub channel_names: Vec<String>,
    /// Arbitrary metadata attributes
    pub attributes: HashMap<String, AttrValue>,
}

impl ImageSpec {
    /// Creates an untiled 2D spec with default channel names.
    ///
    /// Display window equals the data window, origin is zero.
    pub fn new(width: u32, height: u32, nchannels: u32, format: BaseType) -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth: 1,
            full_x: 0,
            full_y: 0,
            full_z: 0,
            full_width: width,
            full_height: height,
            full_depth: 1,
            tile_width: 0,
            tile_height: 0,
            tile_depth: 0,
            nchannels,
            format,
            channel_names: default_channel_names(nchannels),
            attributes: HashMap::new(),
        }
    }

    /// Sets the volume depth (data and display window).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self.full_depth = depth;
        self
    }

    /// Sets the tile size. A zero width makes the spec untiled.
    pub fn with_tiles(mut self, tile_width: u32, tile_height: u32, tile_depth: u32) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self.tile_depth = tile_depth;
        self
    }

    /// Returns `true` if pixels are stored in tiles.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Returns `true` if this is a volumetric image.
    #[inline]
    pub fn is_volume(&self) -> bool {
        self.depth > 1
    }

    /// Tile depth extent, 1 for 2D tiles.
    #[inline]
    pub fn tile_depth_extent(&self) -> u32 {
        self.tile_depth.max(1)
    }

    /// Pixels per tile (`tile_width * tile_height * tile_depth`), 0 if untiled.
    pub fn tile_pixels(&self) -> u64 {
        if !self.is_tiled() {
            return 0;
        }
        self.tile_width as u64 * self.tile_height as u64 * self.tile_depth_extent() as u64
    }

    /// Number of samples in the whole data window: `width * height * depth * nchannels`.
    pub fn image_values(&self) -> Result<usize> {
        checked_product(
            "image",
            &[self.width as u64, self.height as u64, self.depth as u64, self.nchannels as u64],
        )
    }

    /// Number of samples returned by a scanline read: `width * depth * nchannels`.
    ///
    /// For 2D images this is exactly one row. For volumes the row occupies
    /// the leading `width * nchannels` samples.
    pub fn scanline_values(&self) -> Result<usize> {
        checked_product(
            "scanline",
            &[self.width as u64, self.depth as u64, self.nchannels as u64],
        )
    }

    /// Number of samples in one row of the data window: `width * nchannels`.
    pub fn row_values(&self) -> Result<usize> {
        checked_product("row", &[self.width as u64, self.nchannels as u64])
    }

    /// Number of samples in one tile: `tile_width * tile_height * tile_depth * nchannels`.
    pub fn tile_values(&self) -> Result<usize> {
        checked_product(
            "tile",
            &[
                self.tile_width as u64,
                self.tile_height as u64,
                self.tile_depth_extent() as u64,
                self.nchannels as u64,
            ],
        )
    }

    /// Bytes per pixel in the native format.
    #[inline]
    pub fn pixel_bytes(&self) -> usize {
        self.nchannels as usize * self.format.size()
    }

    /// Bytes of one native row.
    pub fn row_bytes(&self) -> Result<usize> {
        bytes_of(self.row_values()?, self.format)
    }

    /// Bytes of one native tile.
    pub fn tile_bytes(&self) -> Result<usize> {
        bytes_of(self.tile_values()?, self.format)
    }

    /// Checks the invariants of a successfully opened image.
    ///
    /// Depth and channel count must be at least 1, the native format must be
    /// a pixel type, and tiling must be either fully set or fully unset.
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::InvalidDimensions("depth must be at least 1".into()));
        }
        if self.nchannels == 0 {
            return Err(Error::InvalidDimensions("channel count must be at least 1".into()));
        }
        if !self.format.is_pixel_type() {
            return Err(Error::UnsupportedType(self.format));
        }
        if (self.tile_width == 0) != (self.tile_height == 0) {
            return Err(Error::InvalidDimensions(format!(
                "partial tile size {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        Ok(())
    }

    /// Returns the name of channel `c`, if present.
    pub fn channel_name(&self, c: usize) -> Option<&str> {
        self.channel_names.get(c).map(String::as_str)
    }

    /// Sets an attribute value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Gets an attribute value by key.
    pub fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Gets an attribute as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get_attr(key).and_then(|v| v.as_str())
    }

    /// Gets an attribute as an integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_attr(key).and_then(|v| v.as_int())
    }

    /// Gets an attribute as a float.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get_attr(key).and_then(|v| v.as_float())
    }
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self::new(0, 0, 0, BaseType::Unknown)
    }
}

impl std::fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{} {} {}ch",
            self.width, self.height, self.depth, self.format, self.nchannels
        )?;
        if self.is_tiled() {
            write!(
                f,
                " tiled {}x{}x{}",
                self.tile_width,
                self.tile_height,
                self.tile_depth_extent()
            )?;
        }
        Ok(())
    }
}

/// Conventional channel names: R, G, B, A, then `channelN`.
pub fn default_channel_names(nchannels: u32) -> Vec<String> {
    match nchannels {
        1 => vec!["Y".into()],
        2 => vec!["Y".into(), "A".into()],
        n => (0..n)
            .map(|c| match c {
                0 => "R".to_string(),
                1 => "G".to_string(),
                2 => "B".to_string(),
                3 => "A".to_string(),
                _ => format!("channel{c}"),
            })
            .collect(),
    }
}

fn checked_product(what: &str, factors: &[u64]) -> Result<usize> {
    factors
        .iter()
        .try_fold(1u64, |acc, &f| acc.checked_mul(f))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::BufferSizeOverflow(format!("{what} size {factors:?}")))
}

fn bytes_of(values: usize, format: BaseType) -> Result<usize> {
    values
        .checked_mul(format.size())
        .ok_or_else(|| Error::BufferSizeOverflow(format!("{values} {format} samples")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_new() {
        let spec = ImageSpec::new(1920, 1080, 4, BaseType::Half);
        assert_eq!(spec.width, 1920);
        assert_eq!(spec.height, 1080);
        assert_eq!(spec.depth, 1);
        assert_eq!(spec.nchannels, 4);
        assert_eq!(spec.channel_names, vec!["R", "G", "B", "A"]);
        assert!(!spec.is_tiled());
        assert_eq!(spec.tile_pixels(), 0);
    }

    #[test]
    fn test_value_counts() {
        let spec = ImageSpec::new(64, 32, 3, BaseType::UInt8);
        assert_eq!(spec.image_values().unwrap(), 64 * 32 * 3);
        assert_eq!(spec.scanline_values().unwrap(), 64 * 3);
        assert_eq!(spec.row_bytes().unwrap(), 192);

        let vol = ImageSpec::new(8, 8, 2, BaseType::Float)
            .with_depth(4)
            .with_tiles(4, 4, 2);
        assert_eq!(vol.image_values().unwrap(), 8 * 8 * 4 * 2);
        assert_eq!(vol.scanline_values().unwrap(), 8 * 4 * 2);
        assert_eq!(vol.tile_values().unwrap(), 4 * 4 * 2 * 2);
        assert_eq!(vol.tile_bytes().unwrap(), 4 * 4 * 2 * 2 * 4);
        assert_eq!(vol.tile_pixels(), 32);
    }

    #[test]
    fn test_flat_tile_depth() {
        let spec = ImageSpec::new(100, 100, 4, BaseType::UInt16).with_tiles(32, 16, 0);
        assert!(spec.is_tiled());
        assert_eq!(spec.tile_values().unwrap(), 32 * 16 * 4);
    }

    #[test]
    fn test_overflow_is_error() {
        let spec = ImageSpec::new(u32::MAX, u32::MAX, u32::MAX, BaseType::Double)
            .with_depth(u32::MAX);
        assert!(matches!(spec.image_values(), Err(Error::BufferSizeOverflow(_))));
    }

    #[test]
    fn test_validate() {
        assert!(ImageSpec::new(4, 4, 3, BaseType::UInt8).validate().is_ok());
        assert!(ImageSpec::default().validate().is_err());
        assert!(ImageSpec::new(4, 4, 3, BaseType::UInt8).with_depth(0).validate().is_err());
        assert!(ImageSpec::new(4, 4, 3, BaseType::String).validate().is_err());
        assert!(
            ImageSpec::new(4, 4, 3, BaseType::UInt8)
                .with_tiles(4, 0, 0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_spec_attributes() {
        let mut spec = ImageSpec::new(10, 10, 3, BaseType::Float);
        spec.set_attr("Software", "imgin");
        spec.set_attr("Exposure", 1.5f32);
        spec.set_attr("BitsPerSample", 16u32);

        assert_eq!(spec.get_string("Software"), Some("imgin"));
        assert_eq!(spec.get_float("Exposure"), Some(1.5));
        assert_eq!(spec.get_int("BitsPerSample"), Some(16));
        assert_eq!(spec.get_int("Missing"), None);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(default_channel_names(1), vec!["Y"]);
        assert_eq!(default_channel_names(3), vec!["R", "G", "B"]);
        assert_eq!(default_channel_names(5)[4], "channel4");
    }
}
