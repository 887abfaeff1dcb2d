//! Element Kind Registry
//!
//! The closed set of element types the native side can hold, and the
//! mapping from host type tags onto it. Host integer tags name C types
//! whose width depends on the platform, so they are resolved by bit width
//! and signedness rather than by name.

use std::fmt;

use ndbridge_host::{CTypeWidths, Descriptor, ScalarClass, TypeTag};

use crate::error::{BridgeError, BridgeResult};

/// Element type of a native array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

/// Storage class of every kind, in declaration order
static CLASSES: [(ElementKind, ScalarClass); 13] = [
    (ElementKind::Bool, ScalarClass::Bool),
    (ElementKind::Int8, ScalarClass::Signed(8)),
    (ElementKind::Int16, ScalarClass::Signed(16)),
    (ElementKind::Int32, ScalarClass::Signed(32)),
    (ElementKind::Int64, ScalarClass::Signed(64)),
    (ElementKind::UInt8, ScalarClass::Unsigned(8)),
    (ElementKind::UInt16, ScalarClass::Unsigned(16)),
    (ElementKind::UInt32, ScalarClass::Unsigned(32)),
    (ElementKind::UInt64, ScalarClass::Unsigned(64)),
    (ElementKind::Float32, ScalarClass::Float(32)),
    (ElementKind::Float64, ScalarClass::Float(64)),
    (ElementKind::Complex64, ScalarClass::Complex(64)),
    (ElementKind::Complex128, ScalarClass::Complex(128)),
];

impl ElementKind {
    /// Every kind, in declaration order
    pub const ALL: [ElementKind; 13] = [
        ElementKind::Bool,
        ElementKind::Int8,
        ElementKind::Int16,
        ElementKind::Int32,
        ElementKind::Int64,
        ElementKind::UInt8,
        ElementKind::UInt16,
        ElementKind::UInt32,
        ElementKind::UInt64,
        ElementKind::Float32,
        ElementKind::Float64,
        ElementKind::Complex64,
        ElementKind::Complex128,
    ];

    /// Host-facing name, e.g. `complex128`
    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::Bool => "bool",
            ElementKind::Int8 => "int8",
            ElementKind::Int16 => "int16",
            ElementKind::Int32 => "int32",
            ElementKind::Int64 => "int64",
            ElementKind::UInt8 => "uint8",
            ElementKind::UInt16 => "uint16",
            ElementKind::UInt32 => "uint32",
            ElementKind::UInt64 => "uint64",
            ElementKind::Float32 => "float32",
            ElementKind::Float64 => "float64",
            ElementKind::Complex64 => "complex64",
            ElementKind::Complex128 => "complex128",
        }
    }

    /// Storage class of the kind
    pub fn class(self) -> ScalarClass {
        CLASSES[self as usize].1
    }

    /// Kind stored with the given class, if any
    pub fn from_class(class: ScalarClass) -> Option<Self> {
        CLASSES
            .iter()
            .find(|(_, c)| *c == class)
            .map(|(kind, _)| *kind)
    }

    /// Element size in bytes
    pub fn itemsize(self) -> usize {
        self.class().itemsize()
    }

    /// Host tag for this kind on the native platform
    pub fn tag(self) -> TypeTag {
        self.tag_with(&CTypeWidths::NATIVE)
    }

    /// Host tag for this kind on an explicit platform
    pub fn tag_with(self, widths: &CTypeWidths) -> TypeTag {
        match self {
            ElementKind::Bool => TypeTag::Bool,
            ElementKind::Int8 => TypeTag::Byte,
            ElementKind::UInt8 => TypeTag::UByte,
            ElementKind::Int16 => TypeTag::Short,
            ElementKind::UInt16 => TypeTag::UShort,
            ElementKind::Int32 if widths.int == 32 => TypeTag::Int,
            ElementKind::UInt32 if widths.int == 32 => TypeTag::UInt,
            ElementKind::Int32 => TypeTag::Long,
            ElementKind::UInt32 => TypeTag::ULong,
            ElementKind::Int64 if widths.long == 64 => TypeTag::Long,
            ElementKind::UInt64 if widths.long == 64 => TypeTag::ULong,
            ElementKind::Int64 => TypeTag::LongLong,
            ElementKind::UInt64 => TypeTag::ULongLong,
            ElementKind::Float32 => TypeTag::Float,
            ElementKind::Float64 => TypeTag::Double,
            ElementKind::Complex64 => TypeTag::CFloat,
            ElementKind::Complex128 => TypeTag::CDouble,
        }
    }

    /// Host descriptor for this kind on the native platform
    pub fn descriptor(self) -> Descriptor {
        Descriptor::new(self.tag())
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a host tag on the native platform
pub fn normalize(tag: TypeTag) -> BridgeResult<ElementKind> {
    normalize_with(tag, &CTypeWidths::NATIVE)
}

/// Resolve a host tag using explicit platform widths.
///
/// Generic integer tags map by width and signedness. Extended precision
/// floats and non-numeric tags have no native kind.
pub fn normalize_with(tag: TypeTag, widths: &CTypeWidths) -> BridgeResult<ElementKind> {
    // long double is unsupported even where it is as narrow as double
    if matches!(tag, TypeTag::LongDouble | TypeTag::CLongDouble) {
        return Err(BridgeError::unsupported_type(tag.c_name()));
    }
    let class = tag
        .class(widths)
        .ok_or_else(|| BridgeError::unsupported_type(tag.c_name()))?;
    ElementKind::from_class(class)
        .ok_or_else(|| BridgeError::unsupported_type(format!("{} ({})", tag.c_name(), class)))
}

/// Resolve a host descriptor
pub fn kind_from_descriptor(descr: &Descriptor) -> BridgeResult<ElementKind> {
    if matches!(descr.tag(), TypeTag::LongDouble | TypeTag::CLongDouble) {
        return Err(BridgeError::unsupported_type(descr.name()));
    }
    let class = descr
        .class()
        .ok_or_else(|| BridgeError::unsupported_type(descr.name()))?;
    ElementKind::from_class(class).ok_or_else(|| BridgeError::unsupported_type(descr.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_long_resolves_by_width() {
        assert_eq!(
            normalize_with(TypeTag::Long, &CTypeWidths::LP64),
            Ok(ElementKind::Int64)
        );
        assert_eq!(
            normalize_with(TypeTag::Long, &CTypeWidths::LLP64),
            Ok(ElementKind::Int32)
        );
        assert_eq!(
            normalize_with(TypeTag::ULong, &CTypeWidths::ILP32),
            Ok(ElementKind::UInt32)
        );
        assert_eq!(
            normalize_with(TypeTag::LongLong, &CTypeWidths::ILP32),
            Ok(ElementKind::Int64)
        );
    }

    #[test]
    fn test_fixed_tags() {
        assert_eq!(normalize(TypeTag::Bool), Ok(ElementKind::Bool));
        assert_eq!(normalize(TypeTag::UByte), Ok(ElementKind::UInt8));
        assert_eq!(normalize(TypeTag::Short), Ok(ElementKind::Int16));
        assert_eq!(normalize(TypeTag::Float), Ok(ElementKind::Float32));
        assert_eq!(normalize(TypeTag::CDouble), Ok(ElementKind::Complex128));
    }

    #[test]
    fn test_unsupported_tags() {
        for tag in [
            TypeTag::LongDouble,
            TypeTag::CLongDouble,
            TypeTag::Object,
            TypeTag::String,
            TypeTag::Unicode,
        ] {
            let err = normalize(tag).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Unsupported);
        }
    }

    #[test]
    fn test_long_double_is_unsupported_at_any_width() {
        let narrow = CTypeWidths::LLP64;
        assert!(normalize_with(TypeTag::LongDouble, &narrow)
            .unwrap_err()
            .is_unsupported());
        assert!(normalize_with(TypeTag::CLongDouble, &narrow)
            .unwrap_err()
            .is_unsupported());
        let descr = Descriptor::with_widths(TypeTag::LongDouble, &narrow);
        assert!(kind_from_descriptor(&descr).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_odd_integer_width_is_unsupported() {
        let widths = CTypeWidths {
            long: 128,
            ..CTypeWidths::LP64
        };
        assert!(normalize_with(TypeTag::Long, &widths).is_err());
    }

    #[test]
    fn test_kinds_round_trip_through_tags() {
        for kind in ElementKind::ALL {
            assert_eq!(normalize(kind.tag()), Ok(kind));
            assert_eq!(kind_from_descriptor(&kind.descriptor()), Ok(kind));
            assert_eq!(kind.descriptor().name(), kind.name());
        }
        for widths in [CTypeWidths::LP64, CTypeWidths::LLP64, CTypeWidths::ILP32] {
            for kind in ElementKind::ALL {
                assert_eq!(normalize_with(kind.tag_with(&widths), &widths), Ok(kind));
            }
        }
    }

    #[test]
    fn test_names_and_sizes() {
        assert_eq!(ElementKind::Complex64.itemsize(), 8);
        assert_eq!(ElementKind::Bool.itemsize(), 1);
        assert_eq!(ElementKind::UInt16.to_string(), "uint16");
    }
}
