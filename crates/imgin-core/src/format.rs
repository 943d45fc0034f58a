//! Per-channel numeric types.
//!
//! [`BaseType`] names the numeric type of one channel sample, both for the
//! native encoding a codec reports in [`crate::ImageSpec::format`] and for the
//! type a caller asks a read to produce.
//!
//! # Usage
//!
//! ```rust
//! use imgin_core::BaseType;
//!
//! assert_eq!(BaseType::UInt16.size(), 2);
//! assert_eq!(BaseType::from_name("half"), Some(BaseType::Half));
//! assert!(!BaseType::String.is_pixel_type());
//! ```

/// Base data type of a channel sample (matches OIIO BASETYPE).
///
/// `Unknown`, `None`, `String` and `Ptr` are part of the vocabulary so that
/// descriptors coming from elsewhere can be represented, but they are not
/// pixel types: asking for a pixel buffer of one of them is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaseType {
    /// Unknown or unspecified type
    #[default]
    Unknown,
    /// No type (void)
    None,
    /// 8-bit unsigned integer
    UInt8,
    /// 8-bit signed integer
    Int8,
    /// 16-bit unsigned integer
    UInt16,
    /// 16-bit signed integer
    Int16,
    /// 32-bit unsigned integer
    UInt32,
    /// 32-bit signed integer
    Int32,
    /// 64-bit unsigned integer
    UInt64,
    /// 64-bit signed integer
    Int64,
    /// 16-bit IEEE floating point (half)
    Half,
    /// 32-bit IEEE floating point
    Float,
    /// 64-bit IEEE floating point
    Double,
    /// String type
    String,
    /// Pointer type
    Ptr,
}

impl BaseType {
    /// Every type a pixel buffer can hold.
    pub const PIXEL_TYPES: [BaseType; 11] = [
        Self::UInt8,
        Self::Int8,
        Self::UInt16,
        Self::Int16,
        Self::UInt32,
        Self::Int32,
        Self::UInt64,
        Self::Int64,
        Self::Half,
        Self::Float,
        Self::Double,
    ];

    /// Size in bytes of one element as stored natively.
    ///
    /// Returns 0 for `Unknown` and `None`.
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::Unknown | Self::None => 0,
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 | Self::Half => 2,
            Self::UInt32 | Self::Int32 | Self::Float => 4,
            Self::UInt64 | Self::Int64 | Self::Double => 8,
            Self::String | Self::Ptr => std::mem::size_of::<usize>(),
        }
    }

    /// Whether this is a floating-point type.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double)
    }

    /// Whether this is a signed type.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Half | Self::Float | Self::Double
        )
    }

    /// Whether this is an integer type.
    #[inline]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::Int8
                | Self::UInt16
                | Self::Int16
                | Self::UInt32
                | Self::Int32
                | Self::UInt64
                | Self::Int64
        )
    }

    /// Whether pixel data can be stored in this type.
    #[inline]
    pub const fn is_pixel_type(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Short name for the type.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::UInt64 => "uint64",
            Self::Int64 => "int64",
            Self::Half => "half",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Ptr => "ptr",
        }
    }

    /// Parses a type name, accepting the OIIO aliases (`uint`, `int`, `uchar`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "unknown" => Self::Unknown,
            "none" => Self::None,
            "uint8" | "uchar" => Self::UInt8,
            "int8" | "char" => Self::Int8,
            "uint16" | "ushort" => Self::UInt16,
            "int16" | "short" => Self::Int16,
            "uint32" | "uint" => Self::UInt32,
            "int32" | "int" => Self::Int32,
            "uint64" | "ulonglong" => Self::UInt64,
            "int64" | "longlong" => Self::Int64,
            "half" | "float16" => Self::Half,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            "string" => Self::String,
            "ptr" | "pointer" => Self::Ptr,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
