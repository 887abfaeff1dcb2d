//! Integration tests for the array bridge.
//!
//! These tests drive handles through their whole lifecycle, from
//! allocation or host aliasing through element access to teardown.

use ndbridge::{
    coerce_shape, host_array_is_behaved, live_buffers, normalize_with, BridgeError, ElementKind,
    ErrorCategory, Handle, MAX_RANK,
};
use ndbridge_host::{
    CTypeWidths, Descriptor, ExceptionKind, HostArray, HostError, HostScalar, HostValue, TypeTag,
};
use num_complex::Complex;

/// A value for element `i` that every kind can store
fn sample(kind: ElementKind, i: usize) -> HostValue {
    match kind {
        ElementKind::Bool => HostValue::Bool(i % 2 == 1),
        ElementKind::Complex64 | ElementKind::Complex128 => {
            HostValue::Complex(Complex::new(i as f64, -(i as f64)))
        }
        _ => HostValue::Int(i as i64 % 100),
    }
}

/// Every position of a shape, in row-major order
fn positions(shape: &[usize]) -> Vec<Vec<isize>> {
    let mut out = vec![vec![]];
    for &extent in shape {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..extent as isize).map(move |i| {
                    let mut position = prefix.clone();
                    position.push(i);
                    position
                })
            })
            .collect();
    }
    out
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_pair_allocates_and_releases() {
        let before = live_buffers();
        for kind in ElementKind::ALL {
            for rank in 1..=MAX_RANK {
                let shape = vec![2; rank];
                let handle = Handle::allocate(kind, rank, &shape).unwrap();
                assert_eq!(handle.kind(), Some(kind));
                assert_eq!(handle.rank(), rank);
                assert_eq!(handle.shape(), &shape[..]);
                assert_eq!(live_buffers(), before + 1);
                handle.release();
            }
        }
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_rank_five_is_unsupported() {
        for kind in ElementKind::ALL {
            let err = Handle::allocate(kind, 5, &[1, 1, 1, 1, 1]).unwrap_err();
            assert!(err.is_unsupported());
            let message = err.to_string();
            assert!(message.contains("@5"), "{message}");
            assert!(message.contains("[1,4]"), "{message}");
            assert_eq!(
                err.into_host_error().kind(),
                ExceptionKind::NotImplementedError
            );
        }
    }

    #[test]
    fn test_host_views_keep_the_buffer_alive() {
        let before = live_buffers();
        let handle = Handle::allocate(ElementKind::Float64, 2, &[2, 2]).unwrap();
        handle.set(&[1, 1], &HostValue::Float(4.0)).unwrap();
        let view = handle.to_host_alias().unwrap();
        let weak = handle.downgrade();

        handle.release();
        assert_eq!(weak.strong_count(), 1);
        assert_eq!(live_buffers(), before + 1);
        assert_eq!(view.get::<f64>(&[1, 1]), Ok(4.0));

        drop(view);
        assert!(weak.upgrade().is_none());
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_native_alias_keeps_the_host_array_alive() {
        let array = HostArray::from_vec(&[3], vec![1.0f32, 2.0, 3.0]).unwrap();
        let weak = array.downgrade();
        let handle = Handle::from_host_alias(&HostValue::Array(array)).unwrap();
        assert_eq!(weak.strong_count(), 1);

        assert_eq!(handle.get(&[2]), Ok(HostScalar::Float32(3.0)));
        handle.release();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_long_normalizes_by_platform() {
        assert_eq!(
            normalize_with(TypeTag::Long, &CTypeWidths::LP64),
            Ok(ElementKind::Int64)
        );
        assert_eq!(
            normalize_with(TypeTag::Long, &CTypeWidths::LLP64),
            Ok(ElementKind::Int32)
        );
        let handle = Handle::allocate_tagged(TypeTag::Long, 1, &[1]).unwrap();
        let expected = if CTypeWidths::NATIVE.long == 64 {
            ElementKind::Int64
        } else {
            ElementKind::Int32
        };
        assert_eq!(handle.kind(), Some(expected));
    }
}

// ============================================================================
// Conversion
// ============================================================================

mod conversion {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_copy_then_alias_round_trip() {
        for kind in ElementKind::ALL {
            for rank in 1..=MAX_RANK {
                let shape: Vec<usize> = (0..rank).map(|axis| axis % 2 + 2).collect();
                let handle = Handle::allocate(kind, rank, &shape).unwrap();
                for (i, position) in positions(&shape).iter().enumerate() {
                    handle.set(position, &sample(kind, i)).unwrap();
                }

                let copy = handle.to_host_copy().unwrap();
                assert_eq!(copy.descr(), kind.descriptor());
                let back = Handle::from_host_alias(&HostValue::Array(copy)).unwrap();
                assert_eq!(back.kind(), Some(kind));
                assert_eq!(back.rank(), rank);
                assert_eq!(back.shape(), handle.shape());
                for position in positions(&shape) {
                    assert_eq!(back.get(&position), handle.get(&position));
                }
            }
        }
    }

    #[test]
    fn test_alias_is_bidirectional() {
        let handle = Handle::allocate(ElementKind::Int32, 2, &[2, 3]).unwrap();
        let view = handle.to_host_alias().unwrap();

        view.set_item(&[0, 2], &HostValue::Int(12)).unwrap();
        assert_eq!(handle.get(&[0, -1]), Ok(HostScalar::Int32(12)));

        handle.set(&[1, 0], &HostValue::Int(-3)).unwrap();
        assert_eq!(view.item(&[1, 0]), Ok(HostScalar::Int32(-3)));
    }

    #[test]
    fn test_native_alias_is_bidirectional() {
        let array = HostArray::zeros(Descriptor::new(TypeTag::CDouble), &[2, 2]).unwrap();
        let handle = Handle::from_host_alias(&HostValue::Array(array.clone())).unwrap();
        assert!(handle.base().unwrap().ptr_eq(&array));

        handle
            .set(&[0, 1], &HostValue::Complex(Complex::new(1.0, 2.0)))
            .unwrap();
        assert_eq!(array.get::<Complex<f64>>(&[0, 1]), Ok(Complex::new(1.0, 2.0)));

        array.set_item(&[1, 0], &HostValue::Float(-1.0)).unwrap();
        assert_eq!(
            handle.get(&[-1, 0]),
            Ok(HostScalar::Complex128(Complex::new(-1.0, 0.0)))
        );
    }

    #[test]
    fn test_strided_host_window() {
        let array = HostArray::from_vec(&[2, 4], (0..8i16).collect()).unwrap();
        let columns = array.slice_axis(1, 0, 2, 2).unwrap();
        assert!(!host_array_is_behaved(&HostValue::Array(columns.clone())));
        assert!(host_array_is_behaved(&HostValue::Array(array.clone())));

        let handle = Handle::from_host_alias(&HostValue::Array(columns)).unwrap();
        assert_eq!(handle.shape(), &[2, 2]);
        assert_eq!(handle.is_behaved(), Ok(false));
        assert_eq!(handle.get(&[1, 1]), Ok(HostScalar::Int16(6)));

        handle.set(&[0, 1], &HostValue::Int(-2)).unwrap();
        assert_eq!(array.get::<i16>(&[0, 2]), Ok(-2));

        let copy = handle.to_host_copy().unwrap();
        assert_eq!(copy.to_vec::<i16>().unwrap(), vec![0, -2, 4, 6]);
        assert!(copy.is_c_contiguous());

        let fresh = Handle::allocate(ElementKind::Int16, 2, &[2, 2]).unwrap();
        assert_eq!(fresh.is_behaved(), Ok(true));
    }

    #[test]
    fn test_transposed_host_array_round_trips() {
        let array = HostArray::from_vec(&[2, 3], vec![1u32, 2, 3, 4, 5, 6]).unwrap();
        let transposed = array.transpose();
        let handle = Handle::from_host_alias(&HostValue::Array(transposed)).unwrap();
        assert_eq!(handle.shape(), &[3, 2]);
        assert_eq!(handle.get(&[2, 0]), Ok(HostScalar::UInt32(3)));

        let copy = handle.to_host_copy().unwrap();
        assert_eq!(copy.to_vec::<u32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_unsupported_host_arrays() {
        let extended = HostArray::zeros(Descriptor::new(TypeTag::LongDouble), &[2]).unwrap();
        let err = Handle::from_host_alias(&HostValue::Array(extended)).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedKind { rank: 1, .. }));

        let err = Handle::from_host_alias(&HostValue::Int(1)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Type);
    }
}

// ============================================================================
// Element access and coercion
// ============================================================================

mod access {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_negative_indexing_on_five_elements() {
        let handle = Handle::allocate(ElementKind::UInt8, 1, &[5]).unwrap();
        for i in 0..5 {
            handle.set(&[i], &HostValue::Int(i as i64 * 10)).unwrap();
        }
        assert_eq!(handle.get(&[-1]), Ok(HostScalar::UInt8(40)));
        assert_eq!(handle.get(&[-5]), Ok(HostScalar::UInt8(0)));

        let err = handle.get(&[-6]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Index);
        assert_eq!(err.into_host_error().kind(), ExceptionKind::IndexError);
    }

    #[test]
    fn test_shape_coercion() {
        assert_eq!(coerce_shape(&HostValue::Int(3)).unwrap().extents(), &[3]);
        assert_eq!(
            coerce_shape(&HostValue::List(vec![HostValue::Int(2), HostValue::Int(3)]))
                .unwrap()
                .extents(),
            &[2, 3]
        );
        let err = coerce_shape(&HostValue::List(vec![HostValue::Int(2), HostValue::Int(-1)]))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Value);
    }

    #[test]
    fn test_errors_reach_the_host() {
        HostError::clear();
        let handle = Handle::allocate(ElementKind::Int8, 1, &[2]).unwrap();
        let err = handle.set(&[0], &HostValue::Float(f64::NAN)).unwrap_err();
        err.raise();
        assert!(HostError::occurred());
        let pending = HostError::fetch().unwrap();
        assert_eq!(pending.kind(), ExceptionKind::ValueError);
        assert!(!HostError::occurred());
    }
}
