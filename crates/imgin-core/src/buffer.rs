//! Typed pixel buffers.
//!
//! A read that lets the caller choose the output type returns a
//! [`PixelBuffer`]: one flat, contiguous vector whose element type is one of
//! the supported [`BaseType`]s, tagged so the caller can match on it instead
//! of guessing.
//!
//! | Requested type | Variant | Element |
//! |----------------|---------|---------|
//! | `UInt8` | [`PixelBuffer::UInt8`] | `u8` |
//! | `Int8` | [`PixelBuffer::Int8`] | `i8` |
//! | `UInt16` | [`PixelBuffer::UInt16`] | `u16` |
//! | `Int16` | [`PixelBuffer::Int16`] | `i16` |
//! | `UInt32` | [`PixelBuffer::UInt32`] | `u32` |
//! | `Int32` | [`PixelBuffer::Int32`] | `i32` |
//! | `UInt64` | [`PixelBuffer::UInt64`] | `u64` |
//! | `Int64` | [`PixelBuffer::Int64`] | `i64` |
//! | `Half` | [`PixelBuffer::Half`] | `f32` (half-quantized) |
//! | `Float` | [`PixelBuffer::Float`] | `f32` |
//! | `Double` | [`PixelBuffer::Double`] | `f64` |
//!
//! ```rust
//! use imgin_core::{BaseType, ImageSpec, PixelBuffer};
//!
//! let spec = ImageSpec::new(4, 2, 3, BaseType::UInt8);
//! let buf = PixelBuffer::for_image(&spec, BaseType::UInt16).unwrap();
//! assert_eq!(buf.len(), 24);
//! assert_eq!(buf.base_type(), BaseType::UInt16);
//!
//! assert!(PixelBuffer::for_image(&spec, BaseType::String).is_err());
//! ```

use crate::error::{Error, Result};
use crate::format::BaseType;
use crate::spec::ImageSpec;

/// Zero-initialized, homogeneously typed sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    /// 8-bit unsigned samples
    UInt8(Vec<u8>),
    /// 8-bit signed samples
    Int8(Vec<i8>),
    /// 16-bit unsigned samples
    UInt16(Vec<u16>),
    /// 16-bit signed samples
    Int16(Vec<i16>),
    /// 32-bit unsigned samples
    UInt32(Vec<u32>),
    /// 32-bit signed samples
    Int32(Vec<i32>),
    /// 64-bit unsigned samples
    UInt64(Vec<u64>),
    /// 64-bit signed samples
    Int64(Vec<i64>),
    /// Half-precision samples widened to `f32`
    Half(Vec<f32>),
    /// 32-bit float samples
    Float(Vec<f32>),
    /// 64-bit float samples
    Double(Vec<f64>),
}

impl PixelBuffer {
    /// Allocates `len` zeroed elements of type `ty`.
    ///
    /// Fails with [`Error::UnsupportedType`] for non-pixel types and with
    /// [`Error::AllocationFailed`] when the memory is not available.
    pub fn allocate(ty: BaseType, len: usize) -> Result<Self> {
        let buf = match ty {
            BaseType::UInt8 => Self::UInt8(zeroed(len)?),
            BaseType::Int8 => Self::Int8(zeroed(len)?),
            BaseType::UInt16 => Self::UInt16(zeroed(len)?),
            BaseType::Int16 => Self::Int16(zeroed(len)?),
            BaseType::UInt32 => Self::UInt32(zeroed(len)?),
            BaseType::Int32 => Self::Int32(zeroed(len)?),
            BaseType::UInt64 => Self::UInt64(zeroed(len)?),
            BaseType::Int64 => Self::Int64(zeroed(len)?),
            BaseType::Half => Self::Half(zeroed(len)?),
            BaseType::Float => Self::Float(zeroed(len)?),
            BaseType::Double => Self::Double(zeroed(len)?),
            BaseType::Unknown | BaseType::None | BaseType::String | BaseType::Ptr => {
                return Err(Error::UnsupportedType(ty));
            }
        };
        Ok(buf)
    }

    /// Allocates a buffer for the whole data window of `spec`.
    pub fn for_image(spec: &ImageSpec, ty: BaseType) -> Result<Self> {
        Self::check_type(ty)?;
        Self::allocate(ty, spec.image_values()?)
    }

    /// Allocates a buffer for one scanline read of `spec`.
    pub fn for_scanline(spec: &ImageSpec, ty: BaseType) -> Result<Self> {
        Self::check_type(ty)?;
        Self::allocate(ty, spec.scanline_values()?)
    }

    /// Allocates a buffer for one tile of `spec`.
    pub fn for_tile(spec: &ImageSpec, ty: BaseType) -> Result<Self> {
        Self::check_type(ty)?;
        Self::allocate(ty, spec.tile_values()?)
    }

    /// Rejects non-pixel types without allocating.
    #[inline]
    pub fn check_type(ty: BaseType) -> Result<()> {
        if ty.is_pixel_type() {
            Ok(())
        } else {
            Err(Error::UnsupportedType(ty))
        }
    }

    /// Bytes needed for `len` elements of `ty` once allocated.
    ///
    /// `Half` is stored widened, so it costs 4 bytes per element.
    pub fn byte_size(ty: BaseType, len: usize) -> Result<usize> {
        let elem = match ty {
            BaseType::Half => std::mem::size_of::<f32>(),
            other => other.size(),
        };
        len.checked_mul(elem)
            .ok_or_else(|| Error::BufferSizeOverflow(format!("{len} {ty} elements")))
    }

    /// The type this buffer was requested as.
    pub fn base_type(&self) -> BaseType {
        match self {
            Self::UInt8(_) => BaseType::UInt8,
            Self::Int8(_) => BaseType::Int8,
            Self::UInt16(_) => BaseType::UInt16,
            Self::Int16(_) => BaseType::Int16,
            Self::UInt32(_) => BaseType::UInt32,
            Self::Int32(_) => BaseType::Int32,
            Self::UInt64(_) => BaseType::UInt64,
            Self::Int64(_) => BaseType::Int64,
            Self::Half(_) => BaseType::Half,
            Self::Float(_) => BaseType::Float,
            Self::Double(_) => BaseType::Double,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::UInt8(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Half(v) | Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows `f32` samples (`Float` and `Half` buffers).
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float(v) | Self::Half(v) => Some(v),
            _ => None,
        }
    }

    /// Takes `f32` samples (`Float` and `Half` buffers).
    pub fn into_f32(self) -> Option<Vec<f32>> {
        match self {
            Self::Float(v) | Self::Half(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows `u8` samples.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Self::UInt8(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows `u16` samples.
    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            Self::UInt16(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows `f64` samples.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Reads element `i` normalized the same way conversion normalizes native data.
    ///
    /// Integers map to [0, 1] (unsigned) or [-1, 1] (signed); floats pass through.
    pub fn get_normalized(&self, i: usize) -> Option<f64> {
        use crate::convert::Sample;
        Some(match self {
            Self::UInt8(v) => v.get(i)?.to_normalized(),
            Self::Int8(v) => v.get(i)?.to_normalized(),
            Self::UInt16(v) => v.get(i)?.to_normalized(),
            Self::Int16(v) => v.get(i)?.to_normalized(),
            Self::UInt32(v) => v.get(i)?.to_normalized(),
            Self::Int32(v) => v.get(i)?.to_normalized(),
            Self::UInt64(v) => v.get(i)?.to_normalized(),
            Self::Int64(v) => v.get(i)?.to_normalized(),
            Self::Half(v) | Self::Float(v) => v.get(i)?.to_normalized(),
            Self::Double(v) => v.get(i)?.to_normalized(),
        })
    }
}

/// Allocates `len` default (zero) elements without aborting on failure.
///
/// Sizes taken from file headers go through here, so a bogus header turns
/// into [`Error::AllocationFailed`] instead of an out-of-memory abort.
pub fn zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::AllocationFailed {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, T::default());
    Ok(v)
}
