//! Host Value Representations
//!
//! The host is dynamically typed. [`HostValue`] covers the values the
//! bridge exchanges with it: plain numbers, sequences, dtype objects,
//! arrays, and typed array scalars ([`HostScalar`]).

use std::fmt;

use num_complex::Complex;
use smol_str::SmolStr;

use crate::array::HostArray;
use crate::error::{HostError, HostResult};
use crate::tag::{Descriptor, ScalarClass};

// ============================================================================
// HostScalar - typed array element
// ============================================================================

/// A single array element, tagged with its storage class.
///
/// This is what the host hands back when a program reads one element of
/// an array: the value keeps its exact width instead of widening to a
/// plain `int` or `float`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostScalar {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Complex64(Complex<f32>),
    Complex128(Complex<f64>),
}

impl HostScalar {
    /// Storage class of the scalar
    pub fn class(&self) -> ScalarClass {
        match self {
            HostScalar::Bool(_) => ScalarClass::Bool,
            HostScalar::Int8(_) => ScalarClass::Signed(8),
            HostScalar::Int16(_) => ScalarClass::Signed(16),
            HostScalar::Int32(_) => ScalarClass::Signed(32),
            HostScalar::Int64(_) => ScalarClass::Signed(64),
            HostScalar::UInt8(_) => ScalarClass::Unsigned(8),
            HostScalar::UInt16(_) => ScalarClass::Unsigned(16),
            HostScalar::UInt32(_) => ScalarClass::Unsigned(32),
            HostScalar::UInt64(_) => ScalarClass::Unsigned(64),
            HostScalar::Float32(_) => ScalarClass::Float(32),
            HostScalar::Float64(_) => ScalarClass::Float(64),
            HostScalar::Complex64(_) => ScalarClass::Complex(64),
            HostScalar::Complex128(_) => ScalarClass::Complex(128),
        }
    }

    /// Host type name of the scalar, e.g. `numpy.int32`
    pub fn type_name(&self) -> &'static str {
        match self {
            HostScalar::Bool(_) => "numpy.bool_",
            HostScalar::Int8(_) => "numpy.int8",
            HostScalar::Int16(_) => "numpy.int16",
            HostScalar::Int32(_) => "numpy.int32",
            HostScalar::Int64(_) => "numpy.int64",
            HostScalar::UInt8(_) => "numpy.uint8",
            HostScalar::UInt16(_) => "numpy.uint16",
            HostScalar::UInt32(_) => "numpy.uint32",
            HostScalar::UInt64(_) => "numpy.uint64",
            HostScalar::Float32(_) => "numpy.float32",
            HostScalar::Float64(_) => "numpy.float64",
            HostScalar::Complex64(_) => "numpy.complex64",
            HostScalar::Complex128(_) => "numpy.complex128",
        }
    }

    /// Host descriptor matching the scalar's class
    pub fn descriptor(&self) -> HostResult<Descriptor> {
        Descriptor::for_class(self.class())
    }

    /// Widen to a [`Numeric`]
    pub fn numeric(&self) -> Numeric {
        match *self {
            HostScalar::Bool(b) => Numeric::Int(i128::from(b)),
            HostScalar::Int8(v) => Numeric::Int(v.into()),
            HostScalar::Int16(v) => Numeric::Int(v.into()),
            HostScalar::Int32(v) => Numeric::Int(v.into()),
            HostScalar::Int64(v) => Numeric::Int(v.into()),
            HostScalar::UInt8(v) => Numeric::Int(v.into()),
            HostScalar::UInt16(v) => Numeric::Int(v.into()),
            HostScalar::UInt32(v) => Numeric::Int(v.into()),
            HostScalar::UInt64(v) => Numeric::Int(v.into()),
            HostScalar::Float32(v) => Numeric::Float(v.into()),
            HostScalar::Float64(v) => Numeric::Float(v),
            HostScalar::Complex64(c) => Numeric::Complex(Complex::new(c.re.into(), c.im.into())),
            HostScalar::Complex128(c) => Numeric::Complex(c),
        }
    }
}

impl fmt::Display for HostScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostScalar::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            HostScalar::Int8(v) => write!(f, "{v}"),
            HostScalar::Int16(v) => write!(f, "{v}"),
            HostScalar::Int32(v) => write!(f, "{v}"),
            HostScalar::Int64(v) => write!(f, "{v}"),
            HostScalar::UInt8(v) => write!(f, "{v}"),
            HostScalar::UInt16(v) => write!(f, "{v}"),
            HostScalar::UInt32(v) => write!(f, "{v}"),
            HostScalar::UInt64(v) => write!(f, "{v}"),
            HostScalar::Float32(v) => write!(f, "{v:?}"),
            HostScalar::Float64(v) => write!(f, "{v:?}"),
            HostScalar::Complex64(c) => write_complex(f, c.re.into(), c.im.into()),
            HostScalar::Complex128(c) => write_complex(f, c.re, c.im),
        }
    }
}

fn write_complex(f: &mut fmt::Formatter<'_>, re: f64, im: f64) -> fmt::Result {
    if im.is_sign_negative() {
        write!(f, "({re:?}-{:?}j)", -im)
    } else {
        write!(f, "({re:?}+{im:?}j)")
    }
}

/// A host number widened to its widest representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// Any integer, booleans included
    Int(i128),
    /// Real floating point
    Float(f64),
    /// Complex floating point
    Complex(Complex<f64>),
}

// ============================================================================
// HostValue - any value crossing the boundary
// ============================================================================

/// Represents any host value the bridge can receive or produce.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// `None`
    None,

    /// `bool`
    Bool(bool),

    /// `int` (bounded to i64 here)
    Int(i64),

    /// `float`
    Float(f64),

    /// `complex`
    Complex(Complex<f64>),

    /// `str`
    Str(SmolStr),

    /// `list`
    List(Vec<HostValue>),

    /// `tuple`
    Tuple(Vec<HostValue>),

    /// Typed array scalar
    Scalar(HostScalar),

    /// dtype object
    Dtype(Descriptor),

    /// Array reference
    Array(HostArray),

    /// Opaque object, identified by its type name
    Object(SmolStr),
}

impl HostValue {
    /// Build a tuple of integers, the usual way shapes are spelled
    pub fn int_tuple<I>(items: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        HostValue::Tuple(items.into_iter().map(HostValue::Int).collect())
    }

    /// Host type name for this value
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Complex(_) => "complex",
            HostValue::Str(_) => "str",
            HostValue::List(_) => "list",
            HostValue::Tuple(_) => "tuple",
            HostValue::Scalar(s) => s.type_name(),
            HostValue::Dtype(_) => "numpy.dtype",
            HostValue::Array(_) => "numpy.ndarray",
            HostValue::Object(name) => name,
        }
    }

    /// Check if this value is None
    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    /// Check if the value supports the number protocol
    pub fn is_number(&self) -> bool {
        self.numeric().is_some()
    }

    /// Widen a number to a [`Numeric`], `None` for anything else
    pub fn numeric(&self) -> Option<Numeric> {
        match self {
            HostValue::Bool(b) => Some(Numeric::Int(i128::from(*b))),
            HostValue::Int(n) => Some(Numeric::Int(i128::from(*n))),
            HostValue::Float(x) => Some(Numeric::Float(*x)),
            HostValue::Complex(c) => Some(Numeric::Complex(*c)),
            HostValue::Scalar(s) => Some(s.numeric()),
            _ => None,
        }
    }

    /// Truthiness, as the host's `bool()` would report it
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::None => false,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::List(items) | HostValue::Tuple(items) => !items.is_empty(),
            HostValue::Array(array) => array.size() > 0,
            HostValue::Dtype(_) | HostValue::Object(_) => true,
            _ => match self.numeric() {
                Some(Numeric::Int(n)) => n != 0,
                Some(Numeric::Float(x)) => x != 0.0,
                Some(Numeric::Complex(c)) => c.re != 0.0 || c.im != 0.0,
                None => true,
            },
        }
    }

    /// Check if the value supports the sequence protocol
    pub fn is_sequence(&self) -> bool {
        match self {
            HostValue::Str(_) | HostValue::List(_) | HostValue::Tuple(_) => true,
            HostValue::Array(array) => array.ndim() > 0,
            _ => false,
        }
    }

    /// Sequence length, `None` if the value is not a sequence
    pub fn seq_len(&self) -> Option<usize> {
        match self {
            HostValue::Str(s) => Some(s.chars().count()),
            HostValue::List(items) | HostValue::Tuple(items) => Some(items.len()),
            HostValue::Array(array) if array.ndim() > 0 => Some(array.shape()[0]),
            _ => None,
        }
    }

    /// Item `i` of a sequence
    pub fn seq_item(&self, i: usize) -> HostResult<HostValue> {
        let out_of_range = || HostError::index_error(format!("{} index out of range", self.type_name()));
        match self {
            HostValue::Str(s) => s
                .chars()
                .nth(i)
                .map(|c| HostValue::Str(SmolStr::new(c.encode_utf8(&mut [0; 4]))))
                .ok_or_else(out_of_range),
            HostValue::List(items) | HostValue::Tuple(items) => {
                items.get(i).cloned().ok_or_else(out_of_range)
            }
            HostValue::Array(array) if array.ndim() == 1 => {
                array.item(&[i]).map(HostValue::Scalar)
            }
            HostValue::Array(array) if array.ndim() > 1 => {
                array.subarray(i).map(HostValue::Array)
            }
            _ => Err(HostError::type_error(format!(
                "'{}' object is not subscriptable",
                self.type_name()
            ))),
        }
    }

    /// Interpret the value as a sequence position.
    ///
    /// Only integers qualify. Floats are rejected even when integral.
    pub fn as_index(&self) -> HostResult<isize> {
        let n = match self {
            HostValue::Bool(b) => i128::from(*b),
            HostValue::Int(n) => i128::from(*n),
            HostValue::Scalar(s) if !matches!(s, HostScalar::Bool(_)) => match s.numeric() {
                Numeric::Int(n) => n,
                _ => return Err(not_an_integer(self)),
            },
            _ => return Err(not_an_integer(self)),
        };
        isize::try_from(n).map_err(|_| {
            HostError::overflow(format!("{} too large to convert to a C ssize_t", self.type_name()))
        })
    }
}

fn not_an_integer(value: &HostValue) -> HostError {
    HostError::type_error(format!(
        "'{}' object cannot be interpreted as an integer",
        value.type_name()
    ))
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => f.write_str("None"),
            HostValue::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            HostValue::Int(n) => write!(f, "{n}"),
            HostValue::Float(x) => write!(f, "{x:?}"),
            HostValue::Complex(c) => write_complex(f, c.re, c.im),
            HostValue::Str(s) => write!(f, "'{s}'"),
            HostValue::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            HostValue::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            HostValue::Scalar(s) => write!(f, "{s}"),
            HostValue::Dtype(d) => write!(f, "dtype('{d}')"),
            HostValue::Array(array) => write!(f, "{array}"),
            HostValue::Object(name) => write!(f, "<{name} object>"),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[HostValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Int(n)
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<Complex<f64>> for HostValue {
    fn from(c: Complex<f64>) -> Self {
        HostValue::Complex(c)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(SmolStr::new(s))
    }
}

impl From<HostScalar> for HostValue {
    fn from(s: HostScalar) -> Self {
        HostValue::Scalar(s)
    }
}

impl From<Descriptor> for HostValue {
    fn from(d: Descriptor) -> Self {
        HostValue::Dtype(d)
    }
}

impl From<HostArray> for HostValue {
    fn from(array: HostArray) -> Self {
        HostValue::Array(array)
    }
}
