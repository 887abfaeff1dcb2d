//! Conversion between native handles and host arrays.
//!
//! A copy detaches the two sides completely. An alias shares one block of
//! memory, and the side that borrows keeps a strong reference to the side
//! that owns it.

use std::ptr::NonNull;

use ndbridge_host::{HostArray, HostValue};
use tracing::debug;

use crate::dispatch::{self, check_rank, guard, match_buffer, Ranked};
use crate::element::Element;
use crate::error::{BridgeError, BridgeResult, Op};
use crate::handle::Handle;
use crate::kind::kind_from_descriptor;
use crate::native::NativeError;
use crate::MAX_RANK;

fn copy_out<T: Element>(ranked: &Ranked<T>, op: Op) -> BridgeResult<HostArray> {
    let data = guard(op, T::KIND, ranked.rank(), || Ok(ranked.to_row_major()))?;
    Ok(HostArray::from_vec(ranked.shape(), data)?)
}

impl Handle {
    /// Deep, C-contiguous host copy of the elements
    pub fn to_host_copy(&self) -> BridgeResult<HostArray> {
        let (kind, buffer) = self.buffer(Op::HostCopy)?;
        let array = match_buffer!(buffer, |ranked| copy_out(ranked, Op::HostCopy))?;
        debug!(kind = %kind, rank = self.rank(), shape = ?self.shape(), "copied native array to host");
        Ok(array)
    }

    /// Host array sharing this handle's memory.
    ///
    /// The host array holds a clone of the handle as its base, so the
    /// native buffer outlives every host view of it.
    pub fn to_host_alias(&self) -> BridgeResult<HostArray> {
        let (kind, buffer) = self.buffer(Op::HostAlias)?;
        let data = NonNull::new(buffer.data_ptr()).ok_or_else(|| {
            BridgeError::runtime(
                Op::HostAlias,
                kind,
                self.rank(),
                Some(NativeError::NullData.to_string().into()),
            )
        })?;

        // SAFETY: data, shape and strides describe the live buffer, which
        // the base set below keeps alive for the host array's lifetime
        let array = unsafe {
            HostArray::from_raw_parts(
                kind.descriptor(),
                self.shape(),
                &buffer.byte_strides(),
                data,
                buffer.is_writeable(),
            )
        }?;
        array.set_base_object(self.as_object())?;
        debug!(
            kind = %kind,
            rank = self.rank(),
            shape = ?self.shape(),
            refs = self.ref_count(),
            "aliased native array as host array"
        );
        Ok(array)
    }

    /// Host alias when possible, a copy otherwise
    pub fn to_host_any(&self) -> BridgeResult<HostArray> {
        match self.to_host_alias() {
            Ok(array) => Ok(array),
            Err(err) if err.is_unsupported() => Err(err),
            // Not reached by populated handles today: a fresh raw-parts
            // array always accepts its base.
            Err(err) => {
                debug!(%err, "host alias failed, falling back to copy");
                self.to_host_copy()
            }
        }
    }

    /// Wrap a host array's memory without copying.
    ///
    /// The handle keeps the host array alive. Writes through either side
    /// are visible through the other.
    pub fn from_host_alias(value: &HostValue) -> BridgeResult<Handle> {
        let HostValue::Array(array) = value else {
            return Err(BridgeError::type_error(format!(
                "expected a host array, got '{}'",
                value.type_name()
            )));
        };

        let descr = array.descr();
        let rank = array.ndim();
        check_rank(Op::NativeAlias, rank, &descr.name())?;
        let kind = kind_from_descriptor(&descr)
            .map_err(|_| BridgeError::unsupported_kind(Op::NativeAlias, rank, descr.name()))?;

        let buffer = guard(Op::NativeAlias, kind, rank, || {
            let data = NonNull::new(array.data_ptr()).ok_or(NativeError::NullData)?;
            // SAFETY: the handle stores a clone of `array` as its base, so
            // the memory stays valid for as long as the buffer exists
            unsafe {
                dispatch::borrow(
                    kind,
                    rank,
                    data,
                    array.shape(),
                    array.strides(),
                    array.is_writeable(),
                )
            }
        })?;
        debug!(
            kind = %kind,
            rank,
            shape = ?array.shape(),
            writeable = array.is_writeable(),
            "wrapped host array as native array"
        );
        Ok(Handle::populated(buffer, Some(array.clone())))
    }

    /// Check for a C-contiguous layout with an element-aligned data pointer
    pub fn is_behaved(&self) -> BridgeResult<bool> {
        let (kind, buffer) = self.buffer(Op::Behaviour)?;
        guard(Op::Behaviour, kind, self.rank(), || Ok(buffer.is_behaved()))
    }
}

/// Check if a host value is an array the bridge can alias as-is.
///
/// It must be C-contiguous and aligned, with a supported rank and kind.
pub fn host_array_is_behaved(value: &HostValue) -> bool {
    let HostValue::Array(array) = value else {
        return false;
    };
    array.is_carray_ro()
        && (1..=MAX_RANK).contains(&array.ndim())
        && kind_from_descriptor(&array.descr()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::kind::ElementKind;
    use ndbridge_host::{Descriptor, HostScalar, TypeTag};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_copy_is_detached() {
        let handle = Handle::allocate(ElementKind::Int32, 2, &[2, 2]).unwrap();
        handle.set(&[0, 1], &HostValue::Int(3)).unwrap();
        let copy = handle.to_host_copy().unwrap();
        assert_eq!(copy.to_vec::<i32>().unwrap(), vec![0, 3, 0, 0]);
        assert!(copy.owns_data());
        assert!(copy.is_c_contiguous());
        assert_eq!(handle.ref_count(), 1);

        copy.set_item(&[0, 0], &HostValue::Int(8)).unwrap();
        assert_eq!(handle.get(&[0, 0]), Ok(HostScalar::Int32(0)));
    }

    #[test]
    fn test_alias_shares_memory() {
        let handle = Handle::allocate(ElementKind::Float32, 1, &[3]).unwrap();
        let alias = handle.to_host_alias().unwrap();
        assert_eq!(handle.ref_count(), 2);
        assert!(!alias.owns_data());
        assert_eq!(alias.descr(), Descriptor::new(TypeTag::Float));

        alias.set_item(&[2], &HostValue::Float(0.5)).unwrap();
        assert_eq!(handle.get(&[-1]), Ok(HostScalar::Float32(0.5)));
        handle.set(&[0], &HostValue::Int(2)).unwrap();
        assert_eq!(alias.get::<f32>(&[0]), Ok(2.0));

        let base = alias.base().unwrap();
        assert!(Handle::from_base(&base).unwrap().ptr_eq(&handle));
        drop(base);
        drop(alias);
        assert_eq!(handle.ref_count(), 1);
    }

    #[test]
    fn test_to_host_any_prefers_alias() {
        let handle = Handle::allocate(ElementKind::UInt8, 1, &[2]).unwrap();
        let array = handle.to_host_any().unwrap();
        assert!(!array.owns_data());
        assert_eq!(handle.ref_count(), 2);

        let err = Handle::empty().to_host_any().unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_from_host_alias_rejects_non_arrays() {
        let err = Handle::from_host_alias(&HostValue::List(vec![])).unwrap_err();
        assert_eq!(err, BridgeError::type_error("expected a host array, got 'list'"));
    }

    #[test]
    fn test_from_host_alias_rank_and_kind() {
        let scalar = HostArray::zeros(Descriptor::new(TypeTag::Double), &[]).unwrap();
        let err = Handle::from_host_alias(&HostValue::Array(scalar)).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedRank { rank: 0, .. }));

        let wide = HostArray::zeros(Descriptor::new(TypeTag::Double), &[1; 5]).unwrap();
        let err = Handle::from_host_alias(&HostValue::Array(wide)).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedRank { rank: 5, .. }));
    }

    #[test]
    fn test_from_host_alias_negative_stride() {
        let array = HostArray::from_vec(&[4], vec![1i64, 2, 3, 4]).unwrap();
        let reversed = array.slice_axis(0, 3, 4, -1).unwrap();
        let err = Handle::from_host_alias(&HostValue::Array(reversed)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Runtime);
        assert!(err.to_string().contains("negative stride"));
    }

    #[test]
    fn test_from_host_alias_overlapping_strides() {
        let owner = HostArray::from_vec(&[4], vec![4i64, 5, 6, 7]).unwrap();
        let data = NonNull::new(owner.data_ptr()).unwrap();
        // SAFETY: every reachable offset stays inside owner's four elements
        let overlapping = unsafe {
            HostArray::from_raw_parts(owner.descr(), &[2, 2], &[8, 8], data, true)
        }
        .unwrap();
        overlapping.set_base_object(owner.as_object()).unwrap();

        let err = Handle::from_host_alias(&HostValue::Array(overlapping)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Runtime);
        assert!(err.to_string().contains("reach the same element"));
        assert_eq!(owner.to_vec::<i64>().unwrap(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_read_only_host_array() {
        let array = HostArray::from_vec(&[2], vec![1u16, 2]).unwrap();
        array.set_writeable(false).unwrap();
        let handle = Handle::from_host_alias(&HostValue::Array(array)).unwrap();
        assert_eq!(handle.get(&[1]), Ok(HostScalar::UInt16(2)));
        let err = handle.set(&[0], &HostValue::Int(5)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Runtime);

        let view = handle.to_host_alias().unwrap();
        assert!(!view.is_writeable());
    }

    #[test]
    fn test_behaviour() {
        let handle = Handle::allocate(ElementKind::Float64, 2, &[3, 4]).unwrap();
        assert_eq!(handle.is_behaved(), Ok(true));
        assert!(Handle::empty().is_behaved().is_err());

        let array = HostArray::zeros(Descriptor::new(TypeTag::Double), &[3, 4]).unwrap();
        assert!(host_array_is_behaved(&HostValue::Array(array.clone())));
        assert!(!host_array_is_behaved(&HostValue::Array(array.transpose())));
        assert!(!host_array_is_behaved(&HostValue::Int(1)));

        let extended = HostArray::zeros(Descriptor::new(TypeTag::LongDouble), &[2]).unwrap();
        assert!(extended.is_carray_ro());
        assert!(!host_array_is_behaved(&HostValue::Array(extended)));
    }
}
