//! Native element types, one per [`ElementKind`].

use ndbridge_host::HostElement;
use num_complex::Complex;

use crate::dispatch::{ErasedBuffer, Ranked};
use crate::kind::ElementKind;

/// A Rust type that can be stored in a native array.
pub trait Element: HostElement {
    /// The kind this type represents
    const KIND: ElementKind;

    /// Tag a typed buffer with its kind
    fn erase(buffer: Ranked<Self>) -> ErasedBuffer;
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident;)*) => {
        $(
            impl Element for $ty {
                const KIND: ElementKind = ElementKind::$kind;

                fn erase(buffer: Ranked<Self>) -> ErasedBuffer {
                    ErasedBuffer::$kind(buffer)
                }
            }
        )*
    };
}

impl_element! {
    bool => Bool;
    i8 => Int8;
    i16 => Int16;
    i32 => Int32;
    i64 => Int64;
    u8 => UInt8;
    u16 => UInt16;
    u32 => UInt32;
    u64 => UInt64;
    f32 => Float32;
    f64 => Float64;
    Complex<f32> => Complex64;
    Complex<f64> => Complex128;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_matches<T: Element>() -> bool {
        T::KIND.class() == T::CLASS
    }

    #[test]
    fn test_kinds_agree_with_host_classes() {
        assert!(class_matches::<bool>());
        assert!(class_matches::<i8>());
        assert!(class_matches::<i16>());
        assert!(class_matches::<i32>());
        assert!(class_matches::<i64>());
        assert!(class_matches::<u8>());
        assert!(class_matches::<u16>());
        assert!(class_matches::<u32>());
        assert!(class_matches::<u64>());
        assert!(class_matches::<f32>());
        assert!(class_matches::<f64>());
        assert!(class_matches::<Complex<f32>>());
        assert!(class_matches::<Complex<f64>>());
    }
}
