//! Element Conversion
//!
//! [`HostElement`] ties a Rust element type to its host storage class and
//! defines how host values are coerced into it when assigned to an array
//! element.
//!
//! ## Coercion Rules
//!
//! - `bool` takes the truthiness of any number
//! - integers accept integers and finite floats (truncated), and reject
//!   complex numbers
//! - floats accept integers and floats
//! - complex accepts every number
//!
//! Anything that is not a number is a `TypeError`. An integer that does
//! not fit is an `OverflowError`.

use std::fmt::Debug;
use std::ptr;

use num_complex::Complex;

use crate::error::{HostError, HostResult};
use crate::tag::{Descriptor, ScalarClass};
use crate::value::{HostScalar, HostValue, Numeric};

/// A Rust type that can live in a host array buffer.
pub trait HostElement: Copy + Default + Debug + 'static {
    /// Host storage class of the type
    const CLASS: ScalarClass;

    /// Wrap as a typed host scalar
    fn into_scalar(self) -> HostScalar;

    /// Coerce a host value into this type
    fn from_value(value: &HostValue) -> HostResult<Self>;

    /// Host descriptor for this type
    fn descriptor() -> HostResult<Descriptor> {
        Descriptor::for_class(Self::CLASS)
    }

    /// Read one element from host memory.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `CLASS.itemsize()` bytes.
    unsafe fn read(src: *const u8) -> Self {
        ptr::read_unaligned(src.cast::<Self>())
    }

    /// Write one element to host memory.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `CLASS.itemsize()` bytes.
    unsafe fn write(self, dst: *mut u8) {
        ptr::write_unaligned(dst.cast::<Self>(), self)
    }
}

fn number_of(value: &HostValue, class: ScalarClass) -> HostResult<Numeric> {
    value.numeric().ok_or_else(|| {
        HostError::type_error(format!(
            "expected a number for a {} element, got '{}'",
            class,
            value.type_name()
        ))
    })
}

impl HostElement for bool {
    const CLASS: ScalarClass = ScalarClass::Bool;

    fn into_scalar(self) -> HostScalar {
        HostScalar::Bool(self)
    }

    fn from_value(value: &HostValue) -> HostResult<Self> {
        Ok(match number_of(value, Self::CLASS)? {
            Numeric::Int(n) => n != 0,
            Numeric::Float(x) => x != 0.0,
            Numeric::Complex(c) => c.re != 0.0 || c.im != 0.0,
        })
    }

    // Any nonzero byte reads as true.
    unsafe fn read(src: *const u8) -> Self {
        *src != 0
    }

    unsafe fn write(self, dst: *mut u8) {
        *dst = u8::from(self);
    }
}

macro_rules! impl_int_element {
    ($($ty:ty => $class:expr, $variant:ident;)*) => {
        $(
            impl HostElement for $ty {
                const CLASS: ScalarClass = $class;

                fn into_scalar(self) -> HostScalar {
                    HostScalar::$variant(self)
                }

                fn from_value(value: &HostValue) -> HostResult<Self> {
                    let n = match number_of(value, Self::CLASS)? {
                        Numeric::Int(n) => n,
                        Numeric::Float(x) if x.is_nan() => {
                            return Err(HostError::value_error("cannot convert float NaN to integer"));
                        }
                        Numeric::Float(x) if x.is_infinite() => {
                            return Err(HostError::overflow("cannot convert float infinity to integer"));
                        }
                        Numeric::Float(x) => x.trunc() as i128,
                        Numeric::Complex(_) => {
                            return Err(HostError::type_error(format!(
                                "can't convert complex to {}",
                                Self::CLASS
                            )));
                        }
                    };
                    <$ty>::try_from(n).map_err(|_| {
                        HostError::overflow(format!("{} out of bounds for {}", n, Self::CLASS))
                    })
                }
            }
        )*
    };
}

impl_int_element! {
    i8 => ScalarClass::Signed(8), Int8;
    i16 => ScalarClass::Signed(16), Int16;
    i32 => ScalarClass::Signed(32), Int32;
    i64 => ScalarClass::Signed(64), Int64;
    u8 => ScalarClass::Unsigned(8), UInt8;
    u16 => ScalarClass::Unsigned(16), UInt16;
    u32 => ScalarClass::Unsigned(32), UInt32;
    u64 => ScalarClass::Unsigned(64), UInt64;
}

macro_rules! impl_float_element {
    ($($ty:ty => $class:expr, $variant:ident;)*) => {
        $(
            impl HostElement for $ty {
                const CLASS: ScalarClass = $class;

                fn into_scalar(self) -> HostScalar {
                    HostScalar::$variant(self)
                }

                fn from_value(value: &HostValue) -> HostResult<Self> {
                    match number_of(value, Self::CLASS)? {
                        Numeric::Int(n) => Ok(n as $ty),
                        Numeric::Float(x) => Ok(x as $ty),
                        Numeric::Complex(_) => Err(HostError::type_error(format!(
                            "can't convert complex to {}",
                            Self::CLASS
                        ))),
                    }
                }
            }
        )*
    };
}

impl_float_element! {
    f32 => ScalarClass::Float(32), Float32;
    f64 => ScalarClass::Float(64), Float64;
}

macro_rules! impl_complex_element {
    ($($ty:ty => $class:expr, $variant:ident;)*) => {
        $(
            impl HostElement for Complex<$ty> {
                const CLASS: ScalarClass = $class;

                fn into_scalar(self) -> HostScalar {
                    HostScalar::$variant(self)
                }

                fn from_value(value: &HostValue) -> HostResult<Self> {
                    Ok(match number_of(value, Self::CLASS)? {
                        Numeric::Int(n) => Complex::new(n as $ty, 0.0),
                        Numeric::Float(x) => Complex::new(x as $ty, 0.0),
                        Numeric::Complex(c) => Complex::new(c.re as $ty, c.im as $ty),
                    })
                }
            }
        )*
    };
}

impl_complex_element! {
    f32 => ScalarClass::Complex(64), Complex64;
    f64 => ScalarClass::Complex(128), Complex128;
}
