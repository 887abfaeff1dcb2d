//! Host Type Tags and Descriptors
//!
//! The host identifies element types with generic C-level tags (`Int`,
//! `Long`, `Double`, ...). How many bits a tag occupies depends on the
//! platform, so every width question goes through a [`CTypeWidths`] table.
//!
//! ## Type Hierarchy
//!
//! - `TypeTag`: the host's own type numbering
//! - `ScalarClass`: what a tag means in storage terms (signed 32-bit, ...)
//! - `Descriptor`: a tag plus its item size and alignment (the host "dtype")

use std::fmt;
use std::mem::size_of;
use std::os::raw::{c_int, c_long, c_longlong, c_short};

use smol_str::SmolStr;

use crate::error::{HostError, HostResult};

// ============================================================================
// Platform Widths
// ============================================================================

/// Bit widths of the C types behind the generic host tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CTypeWidths {
    /// `char` (always 8 on supported platforms)
    pub char: u32,
    /// `short`
    pub short: u32,
    /// `int`
    pub int: u32,
    /// `long`
    pub long: u32,
    /// `long long`
    pub longlong: u32,
    /// Storage width of `long double`
    pub long_double: u32,
}

impl CTypeWidths {
    /// Widths of the platform this crate was compiled for.
    pub const NATIVE: CTypeWidths = CTypeWidths {
        char: 8,
        short: (size_of::<c_short>() * 8) as u32,
        int: (size_of::<c_int>() * 8) as u32,
        long: (size_of::<c_long>() * 8) as u32,
        longlong: (size_of::<c_longlong>() * 8) as u32,
        long_double: if cfg!(any(windows, target_vendor = "apple")) {
            64
        } else {
            128
        },
    };

    /// 64-bit Unix data model (`long` is 64 bits).
    pub const LP64: CTypeWidths = CTypeWidths {
        char: 8,
        short: 16,
        int: 32,
        long: 64,
        longlong: 64,
        long_double: 128,
    };

    /// 64-bit Windows data model (`long` stays 32 bits).
    pub const LLP64: CTypeWidths = CTypeWidths {
        char: 8,
        short: 16,
        int: 32,
        long: 32,
        longlong: 64,
        long_double: 64,
    };

    /// 32-bit data model.
    pub const ILP32: CTypeWidths = CTypeWidths {
        char: 8,
        short: 16,
        int: 32,
        long: 32,
        longlong: 64,
        long_double: 96,
    };
}

impl Default for CTypeWidths {
    fn default() -> Self {
        Self::NATIVE
    }
}

// ============================================================================
// ScalarClass - storage meaning of a tag
// ============================================================================

/// Storage class of a numeric host type, widths in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarClass {
    /// One byte, zero or one
    Bool,
    /// Two's complement signed integer
    Signed(u32),
    /// Unsigned integer
    Unsigned(u32),
    /// IEEE 754 floating point
    Float(u32),
    /// Pair of floats, width counts both parts
    Complex(u32),
}

impl ScalarClass {
    /// Size of one element in bytes
    pub fn itemsize(self) -> usize {
        match self {
            ScalarClass::Bool => 1,
            ScalarClass::Signed(bits)
            | ScalarClass::Unsigned(bits)
            | ScalarClass::Float(bits)
            | ScalarClass::Complex(bits) => (bits / 8) as usize,
        }
    }

    /// Required alignment in bytes
    pub fn alignment(self) -> usize {
        match self {
            ScalarClass::Complex(_) => (self.itemsize() / 2).clamp(1, 16),
            _ => self.itemsize().clamp(1, 16),
        }
    }

    /// Canonical dtype name, e.g. `int64` or `complex128`
    pub fn name(self) -> SmolStr {
        match self {
            ScalarClass::Bool => SmolStr::new_inline("bool"),
            ScalarClass::Signed(bits) => SmolStr::new(format!("int{bits}")),
            ScalarClass::Unsigned(bits) => SmolStr::new(format!("uint{bits}")),
            ScalarClass::Float(bits) => SmolStr::new(format!("float{bits}")),
            ScalarClass::Complex(bits) => SmolStr::new(format!("complex{bits}")),
        }
    }
}

impl fmt::Display for ScalarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// TypeTag - the host's type numbering
// ============================================================================

/// Host type tag.
///
/// Integer tags name C types, not widths: `Long` is 64 bits on LP64
/// platforms and 32 bits on LLP64 ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TypeTag {
    Bool = 0,
    Byte = 1,
    UByte = 2,
    Short = 3,
    UShort = 4,
    Int = 5,
    UInt = 6,
    Long = 7,
    ULong = 8,
    LongLong = 9,
    ULongLong = 10,
    Float = 11,
    Double = 12,
    LongDouble = 13,
    CFloat = 14,
    CDouble = 15,
    CLongDouble = 16,
    Object = 17,
    String = 18,
    Unicode = 19,
}

impl TypeTag {
    /// Every tag, in code order
    pub const ALL: [TypeTag; 20] = [
        TypeTag::Bool,
        TypeTag::Byte,
        TypeTag::UByte,
        TypeTag::Short,
        TypeTag::UShort,
        TypeTag::Int,
        TypeTag::UInt,
        TypeTag::Long,
        TypeTag::ULong,
        TypeTag::LongLong,
        TypeTag::ULongLong,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::LongDouble,
        TypeTag::CFloat,
        TypeTag::CDouble,
        TypeTag::CLongDouble,
        TypeTag::Object,
        TypeTag::String,
        TypeTag::Unicode,
    ];

    /// Numeric type code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look a tag up by its numeric code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.code() == code)
    }

    /// The C spelling of the type behind this tag
    pub fn c_name(self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Byte => "signed char",
            TypeTag::UByte => "unsigned char",
            TypeTag::Short => "short",
            TypeTag::UShort => "unsigned short",
            TypeTag::Int => "int",
            TypeTag::UInt => "unsigned int",
            TypeTag::Long => "long",
            TypeTag::ULong => "unsigned long",
            TypeTag::LongLong => "long long",
            TypeTag::ULongLong => "unsigned long long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::LongDouble => "long double",
            TypeTag::CFloat => "complex float",
            TypeTag::CDouble => "complex double",
            TypeTag::CLongDouble => "complex long double",
            TypeTag::Object => "object",
            TypeTag::String => "bytes",
            TypeTag::Unicode => "str",
        }
    }

    /// Single-character type code
    pub fn type_char(self) -> char {
        match self {
            TypeTag::Bool => '?',
            TypeTag::Byte => 'b',
            TypeTag::UByte => 'B',
            TypeTag::Short => 'h',
            TypeTag::UShort => 'H',
            TypeTag::Int => 'i',
            TypeTag::UInt => 'I',
            TypeTag::Long => 'l',
            TypeTag::ULong => 'L',
            TypeTag::LongLong => 'q',
            TypeTag::ULongLong => 'Q',
            TypeTag::Float => 'f',
            TypeTag::Double => 'd',
            TypeTag::LongDouble => 'g',
            TypeTag::CFloat => 'F',
            TypeTag::CDouble => 'D',
            TypeTag::CLongDouble => 'G',
            TypeTag::Object => 'O',
            TypeTag::String => 'S',
            TypeTag::Unicode => 'U',
        }
    }

    /// Check if this is one of the generic integer tags
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeTag::Byte
                | TypeTag::UByte
                | TypeTag::Short
                | TypeTag::UShort
                | TypeTag::Int
                | TypeTag::UInt
                | TypeTag::Long
                | TypeTag::ULong
                | TypeTag::LongLong
                | TypeTag::ULongLong
        )
    }

    /// Storage class of this tag on the given platform.
    ///
    /// Returns `None` for non-numeric tags.
    pub fn class(self, widths: &CTypeWidths) -> Option<ScalarClass> {
        let class = match self {
            TypeTag::Bool => ScalarClass::Bool,
            TypeTag::Byte => ScalarClass::Signed(widths.char),
            TypeTag::UByte => ScalarClass::Unsigned(widths.char),
            TypeTag::Short => ScalarClass::Signed(widths.short),
            TypeTag::UShort => ScalarClass::Unsigned(widths.short),
            TypeTag::Int => ScalarClass::Signed(widths.int),
            TypeTag::UInt => ScalarClass::Unsigned(widths.int),
            TypeTag::Long => ScalarClass::Signed(widths.long),
            TypeTag::ULong => ScalarClass::Unsigned(widths.long),
            TypeTag::LongLong => ScalarClass::Signed(widths.longlong),
            TypeTag::ULongLong => ScalarClass::Unsigned(widths.longlong),
            TypeTag::Float => ScalarClass::Float(32),
            TypeTag::Double => ScalarClass::Float(64),
            TypeTag::LongDouble => ScalarClass::Float(widths.long_double),
            TypeTag::CFloat => ScalarClass::Complex(64),
            TypeTag::CDouble => ScalarClass::Complex(128),
            TypeTag::CLongDouble => ScalarClass::Complex(2 * widths.long_double),
            TypeTag::Object | TypeTag::String | TypeTag::Unicode => return None,
        };
        Some(class)
    }

    /// The tag the host uses for a storage class on the given platform.
    ///
    /// Fixed-width integers prefer `long`, then `long long`, then the
    /// narrower types, which is how the host aliases `int64`/`int32`.
    pub fn for_class(class: ScalarClass, widths: &CTypeWidths) -> Option<TypeTag> {
        const SIGNED: [TypeTag; 5] = [
            TypeTag::Long,
            TypeTag::LongLong,
            TypeTag::Int,
            TypeTag::Short,
            TypeTag::Byte,
        ];
        const UNSIGNED: [TypeTag; 5] = [
            TypeTag::ULong,
            TypeTag::ULongLong,
            TypeTag::UInt,
            TypeTag::UShort,
            TypeTag::UByte,
        ];

        match class {
            ScalarClass::Bool => Some(TypeTag::Bool),
            ScalarClass::Signed(_) => SIGNED
                .iter()
                .copied()
                .find(|tag| tag.class(widths) == Some(class)),
            ScalarClass::Unsigned(_) => UNSIGNED
                .iter()
                .copied()
                .find(|tag| tag.class(widths) == Some(class)),
            ScalarClass::Float(32) => Some(TypeTag::Float),
            ScalarClass::Float(64) => Some(TypeTag::Double),
            ScalarClass::Float(bits) if bits == widths.long_double => Some(TypeTag::LongDouble),
            ScalarClass::Complex(64) => Some(TypeTag::CFloat),
            ScalarClass::Complex(128) => Some(TypeTag::CDouble),
            ScalarClass::Complex(bits) if bits == 2 * widths.long_double => {
                Some(TypeTag::CLongDouble)
            }
            ScalarClass::Float(_) | ScalarClass::Complex(_) => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_name())
    }
}

// ============================================================================
// Descriptor - the host dtype
// ============================================================================

/// Host data type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    tag: TypeTag,
    class: Option<ScalarClass>,
    itemsize: usize,
    alignment: usize,
}

impl Descriptor {
    /// Descriptor for a tag on the native platform
    pub fn new(tag: TypeTag) -> Self {
        Self::with_widths(tag, &CTypeWidths::NATIVE)
    }

    /// Descriptor for a tag on an explicit platform
    pub fn with_widths(tag: TypeTag, widths: &CTypeWidths) -> Self {
        let class = tag.class(widths);
        let (itemsize, alignment) = match class {
            Some(class) => (class.itemsize(), class.alignment()),
            None => (size_of::<usize>(), size_of::<usize>()),
        };
        Self {
            tag,
            class,
            itemsize,
            alignment,
        }
    }

    /// Native descriptor for a storage class
    pub fn for_class(class: ScalarClass) -> HostResult<Self> {
        TypeTag::for_class(class, &CTypeWidths::NATIVE)
            .map(Self::new)
            .ok_or_else(|| {
                HostError::not_implemented(format!("no host type for '{}' on this platform", class))
            })
    }

    /// Parse a dtype name or type code (`"float64"`, `"f8"`, `"d"`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let class = match name {
            "bool" | "bool_" | "?" => ScalarClass::Bool,
            "int8" | "i1" | "b" => ScalarClass::Signed(8),
            "int16" | "i2" | "h" => ScalarClass::Signed(16),
            "int32" | "i4" | "i" => ScalarClass::Signed(32),
            "int64" | "i8" | "q" => ScalarClass::Signed(64),
            "uint8" | "u1" | "B" => ScalarClass::Unsigned(8),
            "uint16" | "u2" | "H" => ScalarClass::Unsigned(16),
            "uint32" | "u4" | "I" => ScalarClass::Unsigned(32),
            "uint64" | "u8" | "Q" => ScalarClass::Unsigned(64),
            "float32" | "f4" | "f" => ScalarClass::Float(32),
            "float64" | "f8" | "d" | "float" => ScalarClass::Float(64),
            "complex64" | "c8" | "F" => ScalarClass::Complex(64),
            "complex128" | "c16" | "D" | "complex" => ScalarClass::Complex(128),
            "long" | "l" => return Some(Self::new(TypeTag::Long)),
            "ulong" | "L" => return Some(Self::new(TypeTag::ULong)),
            "longdouble" | "g" => return Some(Self::new(TypeTag::LongDouble)),
            "clongdouble" | "G" => return Some(Self::new(TypeTag::CLongDouble)),
            "object" | "O" => return Some(Self::new(TypeTag::Object)),
            "str" | "U" => return Some(Self::new(TypeTag::Unicode)),
            _ => return None,
        };
        Self::for_class(class).ok()
    }

    /// The host type tag
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Storage class, `None` for non-numeric types
    pub fn class(&self) -> Option<ScalarClass> {
        self.class
    }

    /// Element size in bytes
    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    /// Element alignment in bytes
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Check if elements of this type can be stored in a host array
    pub fn is_numeric(&self) -> bool {
        self.class.is_some()
    }

    /// dtype name, e.g. `float64`
    pub fn name(&self) -> SmolStr {
        match self.class {
            Some(class) => class.name(),
            None => SmolStr::new_inline(self.tag.c_name()),
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
