//! Open-time configuration.
//!
//! [`InputConfig`] is handed to [`ImageInput::open_with_config`](crate::ImageInput::open_with_config)
//! and stays with the reader until the next reopen.
//!
//! ```rust
//! use imgin_io::{InputConfig, Limits};
//!
//! let config = InputConfig::new()
//!     .with_format("pnm")
//!     .with_limits(Limits::new().with_max_pixels(4096 * 4096))
//!     .with_chunk_scanlines(32);
//! assert_eq!(config.format.as_deref(), Some("pnm"));
//! ```

use crate::{IoError, IoResult};
use imgin_core::{BaseType, ImageSpec, PixelBuffer};

/// Default number of scanlines decoded between progress reports.
pub const DEFAULT_CHUNK_SCANLINES: u32 = 16;

/// Resource limits checked against every spec and every buffer allocation.
///
/// All fields default to `None` (no limit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum data window width.
    pub max_width: Option<u64>,
    /// Maximum data window height.
    pub max_height: Option<u64>,
    /// Maximum pixel count (`width * height * depth`).
    pub max_pixels: Option<u64>,
    /// Maximum bytes for a single output buffer.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// No limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum width.
    pub fn with_max_width(mut self, max: u64) -> Self {
        self.max_width = Some(max);
        self
    }

    /// Sets the maximum height.
    pub fn with_max_height(mut self, max: u64) -> Self {
        self.max_height = Some(max);
        self
    }

    /// Sets the maximum pixel count.
    pub fn with_max_pixels(mut self, max: u64) -> Self {
        self.max_pixels = Some(max);
        self
    }

    /// Sets the maximum output buffer size.
    pub fn with_max_memory_bytes(mut self, max: u64) -> Self {
        self.max_memory_bytes = Some(max);
        self
    }

    /// Checks the data window of `spec`.
    pub fn check_spec(&self, spec: &ImageSpec) -> IoResult<()> {
        if let Some(max) = self.max_width {
            if u64::from(spec.width) > max {
                return Err(IoError::LimitExceeded(format!(
                    "width {} exceeds limit {max}",
                    spec.width
                )));
            }
        }
        if let Some(max) = self.max_height {
            if u64::from(spec.height) > max {
                return Err(IoError::LimitExceeded(format!(
                    "height {} exceeds limit {max}",
                    spec.height
                )));
            }
        }
        if let Some(max) = self.max_pixels {
            let pixels = u64::from(spec.width)
                .saturating_mul(u64::from(spec.height))
                .saturating_mul(u64::from(spec.depth));
            if pixels > max {
                return Err(IoError::LimitExceeded(format!(
                    "pixel count {pixels} exceeds limit {max}"
                )));
            }
        }
        Ok(())
    }

    /// Checks an allocation of `len` elements of `ty`.
    pub fn check_buffer(&self, ty: BaseType, len: usize) -> IoResult<()> {
        let bytes = PixelBuffer::byte_size(ty, len)?;
        if let Some(max) = self.max_memory_bytes {
            if bytes as u64 > max {
                return Err(IoError::LimitExceeded(format!(
                    "allocation {bytes} bytes exceeds memory limit {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Reader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    /// Force a plugin by format name, skipping detection.
    pub format: Option<String>,
    /// Resource limits.
    pub limits: Limits,
    /// Scanlines decoded between progress reports in whole-image reads.
    pub chunk_scanlines: u32,
}

impl InputConfig {
    /// Default configuration: detect the format, no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the named plugin.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the progress granularity of scanline reads (minimum 1).
    pub fn with_chunk_scanlines(mut self, rows: u32) -> Self {
        self.chunk_scanlines = rows.max(1);
        self
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: None,
            limits: Limits::default(),
            chunk_scanlines: DEFAULT_CHUNK_SCANLINES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_limits_by_default() {
        let spec = ImageSpec::new(100_000, 100_000, 4, BaseType::Float);
        let limits = Limits::default();
        assert!(limits.check_spec(&spec).is_ok());
        assert!(limits.check_buffer(BaseType::Float, 1 << 20).is_ok());
    }

    #[test]
    fn test_spec_limits() {
        let spec = ImageSpec::new(64, 32, 3, BaseType::UInt8);
        assert!(Limits::new().with_max_width(64).check_spec(&spec).is_ok());
        assert!(matches!(
            Limits::new().with_max_width(63).check_spec(&spec),
            Err(IoError::LimitExceeded(_))
        ));
        assert!(Limits::new().with_max_height(31).check_spec(&spec).is_err());
        assert!(Limits::new().with_max_pixels(2047).check_spec(&spec).is_err());
        assert!(Limits::new().with_max_pixels(2048).check_spec(&spec).is_ok());
    }

    #[test]
    fn test_buffer_limit_counts_widened_half() {
        let limits = Limits::new().with_max_memory_bytes(16);
        assert!(limits.check_buffer(BaseType::Half, 4).is_ok());
        assert!(limits.check_buffer(BaseType::Half, 5).is_err());
        assert!(limits.check_buffer(BaseType::UInt8, 16).is_ok());
    }

    #[test]
    fn test_chunk_scanlines_minimum() {
        assert_eq!(InputConfig::new().with_chunk_scanlines(0).chunk_scanlines, 1);
        assert_eq!(InputConfig::default().chunk_scanlines, DEFAULT_CHUNK_SCANLINES);
    }
}
