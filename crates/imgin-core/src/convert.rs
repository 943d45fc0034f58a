//! Conversion from native sample bytes into typed buffers.
//!
//! Codecs hand over decoded pixels as native-endian bytes in the file's
//! native [`BaseType`]. This module moves them into a [`PixelBuffer`] of the
//! caller's type.
//!
//! # Value mapping
//!
//! - integer → float: unsigned to [0, 1], signed to [-1, 1]
//! - float → integer: clamp to the normalized range, scale by the type
//!   maximum, round to nearest
//! - identical types are copied bit-exactly
//! - `Half` output is quantized to half precision, then widened to `f32`

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::format::BaseType;
use byteorder::{ByteOrder, NativeEndian};
use half::f16;

/// A numeric sample type with a normalized value mapping.
pub trait Sample: Copy {
    /// Converts to the normalized range (floats pass through).
    fn to_normalized(self) -> f64;

    /// Converts from the normalized range, clamping integers.
    fn from_normalized(v: f64) -> Self;
}

macro_rules! unsigned_sample {
    ($t:ty) => {
        impl Sample for $t {
            #[inline]
            fn to_normalized(self) -> f64 {
                self as f64 / <$t>::MAX as f64
            }

            #[inline]
            fn from_normalized(v: f64) -> Self {
                (v.clamp(0.0, 1.0) * <$t>::MAX as f64).round() as $t
            }
        }
    };
}

macro_rules! signed_sample {
    ($t:ty) => {
        impl Sample for $t {
            #[inline]
            fn to_normalized(self) -> f64 {
                (self as f64 / <$t>::MAX as f64).max(-1.0)
            }

            #[inline]
            fn from_normalized(v: f64) -> Self {
                (v.clamp(-1.0, 1.0) * <$t>::MAX as f64).round() as $t
            }
        }
    };
}

unsigned_sample!(u8);
unsigned_sample!(u16);
unsigned_sample!(u32);
unsigned_sample!(u64);
signed_sample!(i8);
signed_sample!(i16);
signed_sample!(i32);
signed_sample!(i64);

impl Sample for f32 {
    #[inline]
    fn to_normalized(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_normalized(v: f64) -> Self {
        v as f32
    }
}

impl Sample for f64 {
    #[inline]
    fn to_normalized(self) -> f64 {
        self
    }

    #[inline]
    fn from_normalized(v: f64) -> Self {
        v
    }
}

/// Decodes one native-endian sample of type `ty` to its normalized value.
///
/// `bytes` must hold at least `ty.size()` bytes.
#[inline]
pub fn load_normalized(bytes: &[u8], ty: BaseType) -> f64 {
    match ty {
        BaseType::UInt8 => bytes[0].to_normalized(),
        BaseType::Int8 => (bytes[0] as i8).to_normalized(),
        BaseType::UInt16 => NativeEndian::read_u16(bytes).to_normalized(),
        BaseType::Int16 => NativeEndian::read_i16(bytes).to_normalized(),
        BaseType::UInt32 => NativeEndian::read_u32(bytes).to_normalized(),
        BaseType::Int32 => NativeEndian::read_i32(bytes).to_normalized(),
        BaseType::UInt64 => NativeEndian::read_u64(bytes).to_normalized(),
        BaseType::Int64 => NativeEndian::read_i64(bytes).to_normalized(),
        BaseType::Half => f16::from_bits(NativeEndian::read_u16(bytes)).to_f64(),
        BaseType::Float => NativeEndian::read_f32(bytes) as f64,
        BaseType::Double => NativeEndian::read_f64(bytes),
        BaseType::Unknown | BaseType::None | BaseType::String | BaseType::Ptr => 0.0,
    }
}

/// Encodes a normalized value as one native-endian sample of type `ty`.
///
/// `out` must hold at least `ty.size()` bytes. Non-pixel types write nothing.
#[inline]
pub fn store_normalized(v: f64, ty: BaseType, out: &mut [u8]) {
    match ty {
        BaseType::UInt8 => out[0] = u8::from_normalized(v),
        BaseType::Int8 => out[0] = i8::from_normalized(v) as u8,
        BaseType::UInt16 => NativeEndian::write_u16(out, u16::from_normalized(v)),
        BaseType::Int16 => NativeEndian::write_i16(out, i16::from_normalized(v)),
        BaseType::UInt32 => NativeEndian::write_u32(out, u32::from_normalized(v)),
        BaseType::Int32 => NativeEndian::write_i32(out, i32::from_normalized(v)),
        BaseType::UInt64 => NativeEndian::write_u64(out, u64::from_normalized(v)),
        BaseType::Int64 => NativeEndian::write_i64(out, i64::from_normalized(v)),
        BaseType::Half => NativeEndian::write_u16(out, f16::from_f64(v).to_bits()),
        BaseType::Float => NativeEndian::write_f32(out, v as f32),
        BaseType::Double => NativeEndian::write_f64(out, v),
        BaseType::Unknown | BaseType::None | BaseType::String | BaseType::Ptr => {}
    }
}

/// Converts native samples into `dst` starting at element `offset`.
///
/// `src` holds whole samples of `src_type`; a trailing partial sample is
/// ignored. Returns the number of elements written.
pub fn convert_native(
    src: &[u8],
    src_type: BaseType,
    dst: &mut PixelBuffer,
    offset: usize,
) -> Result<usize> {
    PixelBuffer::check_type(src_type)?;
    let size = src_type.size();
    let count = src.len() / size;
    let end = offset
        .checked_add(count)
        .filter(|&end| end <= dst.len())
        .ok_or(Error::BufferSizeMismatch {
            needed: offset.saturating_add(count),
            available: dst.len(),
        })?;
    let src = &src[..count * size];

    match (src_type, &mut *dst) {
        (BaseType::UInt8, PixelBuffer::UInt8(v)) => v[offset..end].copy_from_slice(src),
        (BaseType::Int8, PixelBuffer::Int8(v)) => {
            for (d, &s) in v[offset..end].iter_mut().zip(src) {
                *d = s as i8;
            }
        }
        (BaseType::UInt16, PixelBuffer::UInt16(v)) => NativeEndian::read_u16_into(src, &mut v[offset..end]),
        (BaseType::Int16, PixelBuffer::Int16(v)) => NativeEndian::read_i16_into(src, &mut v[offset..end]),
        (BaseType::UInt32, PixelBuffer::UInt32(v)) => NativeEndian::read_u32_into(src, &mut v[offset..end]),
        (BaseType::Int32, PixelBuffer::Int32(v)) => NativeEndian::read_i32_into(src, &mut v[offset..end]),
        (BaseType::UInt64, PixelBuffer::UInt64(v)) => NativeEndian::read_u64_into(src, &mut v[offset..end]),
        (BaseType::Int64, PixelBuffer::Int64(v)) => NativeEndian::read_i64_into(src, &mut v[offset..end]),
        (BaseType::Float, PixelBuffer::Float(v)) => NativeEndian::read_f32_into(src, &mut v[offset..end]),
        (BaseType::Double, PixelBuffer::Double(v)) => NativeEndian::read_f64_into(src, &mut v[offset..end]),
        (_, PixelBuffer::UInt8(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Int8(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::UInt16(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Int16(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::UInt32(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Int32(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::UInt64(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Int64(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Float(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Double(v)) => fill(&mut v[offset..end], src, src_type),
        (_, PixelBuffer::Half(v)) => {
            for (d, s) in v[offset..end].iter_mut().zip(src.chunks_exact(size)) {
                *d = f16::from_f64(load_normalized(s, src_type)).to_f32();
            }
        }
    }
    Ok(count)
}

fn fill<T: Sample>(dst: &mut [T], src: &[u8], src_type: BaseType) {
    for (d, s) in dst.iter_mut().zip(src.chunks_exact(src_type.size())) {
        *d = T::from_normalized(load_normalized(s, src_type));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn native_u16(values: &[u16]) -> Vec<u8> {
        let mut out = vec![0u8; values.len() * 2];
        NativeEndian::write_u16_into(values, &mut out);
        out
    }

    #[test]
    fn test_u8_to_float() {
        let mut dst = PixelBuffer::allocate(BaseType::Float, 3).unwrap();
        let n = convert_native(&[0, 128, 255], BaseType::UInt8, &mut dst, 0).unwrap();
        assert_eq!(n, 3);
        let v = dst.as_f32().unwrap();
        assert_eq!(v[0], 0.0);
        assert_relative_eq!(v[1], 128.0 / 255.0, epsilon = 1e-6);
        assert_eq!(v[2], 1.0);
    }

    #[test]
    fn test_identity_copies_exactly() {
        let src = native_u16(&[0, 1, 65535]);
        let mut dst = PixelBuffer::allocate(BaseType::UInt16, 3).unwrap();
        convert_native(&src, BaseType::UInt16, &mut dst, 0).unwrap();
        assert_eq!(dst.as_u16().unwrap(), &[0, 1, 65535]);
    }

    #[test]
    fn test_int8_identity_keeps_minimum() {
        let mut dst = PixelBuffer::allocate(BaseType::Int8, 3).unwrap();
        convert_native(&[0x80, 0x7f, 0xff], BaseType::Int8, &mut dst, 0).unwrap();
        assert_eq!(dst, PixelBuffer::Int8(vec![i8::MIN, i8::MAX, -1]));

        // through float the minimum still saturates to -1.0
        let mut f = PixelBuffer::allocate(BaseType::Float, 1).unwrap();
        convert_native(&[0x80], BaseType::Int8, &mut f, 0).unwrap();
        assert_eq!(f.as_f32().unwrap(), &[-1.0]);
    }

    #[test]
    fn test_float_to_integer_clamps_and_rounds() {
        let mut src = vec![0u8; 4 * 4];
        NativeEndian::write_f32_into(&[-0.5, 0.5, 1.0, 7.0], &mut src);

        let mut u = PixelBuffer::allocate(BaseType::UInt8, 4).unwrap();
        convert_native(&src, BaseType::Float, &mut u, 0).unwrap();
        assert_eq!(u.as_u8().unwrap(), &[0, 128, 255, 255]);

        let mut s = PixelBuffer::allocate(BaseType::Int8, 4).unwrap();
        convert_native(&src, BaseType::Float, &mut s, 0).unwrap();
        assert_eq!(s, PixelBuffer::Int8(vec![-64, 64, 127, 127]));
    }

    #[test]
    fn test_half_output_is_quantized() {
        let mut src = vec![0u8; 4];
        NativeEndian::write_f32(&mut src, 0.1);
        let mut dst = PixelBuffer::allocate(BaseType::Half, 1).unwrap();
        convert_native(&src, BaseType::Float, &mut dst, 0).unwrap();
        let v = dst.as_f32().unwrap()[0];
        assert_eq!(v, f16::from_f32(0.1).to_f32());
        assert_ne!(v, 0.1f32);
    }

    #[test]
    fn test_offset_and_bounds() {
        let mut dst = PixelBuffer::allocate(BaseType::UInt8, 4).unwrap();
        convert_native(&[9, 9], BaseType::UInt8, &mut dst, 2).unwrap();
        assert_eq!(dst.as_u8().unwrap(), &[0, 0, 9, 9]);

        let err = convert_native(&[1, 2, 3], BaseType::UInt8, &mut dst, 2).unwrap_err();
        assert_eq!(err, Error::BufferSizeMismatch { needed: 5, available: 4 });
    }

    #[test]
    fn test_store_then_load() {
        for ty in BaseType::PIXEL_TYPES {
            let mut bytes = vec![0u8; ty.size()];
            store_normalized(1.0, ty, &mut bytes);
            assert_relative_eq!(load_normalized(&bytes, ty), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_signed_range() {
        assert_eq!(i16::MIN.to_normalized(), -1.0);
        assert_eq!(i16::from_normalized(-2.0), -i16::MAX);
        assert_eq!(u16::from_normalized(f64::NAN), 0);
    }
}
