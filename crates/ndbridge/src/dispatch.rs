//! Dispatch Matrix
//!
//! Handles carry their element kind and rank as runtime values, while the
//! native engine needs both at compile time. Every operation therefore goes
//! through one `match` on the kind and one on the rank, landing in one of
//! 13 x 4 monomorphized code paths. The macros here spell out the whole
//! cross product; there is no generic fallback path.
//!
//! ## Macros
//!
//! - `with_element_type!`: bind a type alias for a runtime [`ElementKind`]
//! - `with_rank!`: bind a dimension alias for a runtime rank
//! - `match_buffer!`: open an [`ErasedBuffer`] as a typed [`Ranked`]
//! - `match_ranked!`: open a [`Ranked`] as a typed [`NativeArray`]

use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;

use ndarray::{Ix1, Ix2, Ix3, Ix4};
use ndbridge_host::{HostElement, HostScalar};
use num_complex::Complex;
use smol_str::SmolStr;
use tracing::warn;

use crate::element::Element;
use crate::error::{BridgeError, BridgeResult, Op};
use crate::kind::ElementKind;
use crate::native::{FixedRank, NativeArray, NativeError};
use crate::MAX_RANK;

macro_rules! with_element_type {
    ($kind:expr, |$t:ident| $body:expr) => {
        match $kind {
            $crate::kind::ElementKind::Bool => {
                type $t = bool;
                $body
            }
            $crate::kind::ElementKind::Int8 => {
                type $t = i8;
                $body
            }
            $crate::kind::ElementKind::Int16 => {
                type $t = i16;
                $body
            }
            $crate::kind::ElementKind::Int32 => {
                type $t = i32;
                $body
            }
            $crate::kind::ElementKind::Int64 => {
                type $t = i64;
                $body
            }
            $crate::kind::ElementKind::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::kind::ElementKind::UInt16 => {
                type $t = u16;
                $body
            }
            $crate::kind::ElementKind::UInt32 => {
                type $t = u32;
                $body
            }
            $crate::kind::ElementKind::UInt64 => {
                type $t = u64;
                $body
            }
            $crate::kind::ElementKind::Float32 => {
                type $t = f32;
                $body
            }
            $crate::kind::ElementKind::Float64 => {
                type $t = f64;
                $body
            }
            $crate::kind::ElementKind::Complex64 => {
                type $t = ::num_complex::Complex<f32>;
                $body
            }
            $crate::kind::ElementKind::Complex128 => {
                type $t = ::num_complex::Complex<f64>;
                $body
            }
        }
    };
}

macro_rules! with_rank {
    ($rank:expr, |$d:ident| $body:expr, $otherwise:expr) => {
        match $rank {
            1 => {
                type $d = ::ndarray::Ix1;
                $body
            }
            2 => {
                type $d = ::ndarray::Ix2;
                $body
            }
            3 => {
                type $d = ::ndarray::Ix3;
                $body
            }
            4 => {
                type $d = ::ndarray::Ix4;
                $body
            }
            _ => $otherwise,
        }
    };
}

macro_rules! match_ranked {
    ($ranked:expr, |$array:ident| $body:expr) => {
        match $ranked {
            $crate::dispatch::Ranked::R1($array) => $body,
            $crate::dispatch::Ranked::R2($array) => $body,
            $crate::dispatch::Ranked::R3($array) => $body,
            $crate::dispatch::Ranked::R4($array) => $body,
        }
    };
}

macro_rules! match_buffer {
    ($buffer:expr, |$ranked:ident| $body:expr) => {
        match $buffer {
            $crate::dispatch::ErasedBuffer::Bool($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Int8($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Int16($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Int32($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Int64($ranked) => $body,
            $crate::dispatch::ErasedBuffer::UInt8($ranked) => $body,
            $crate::dispatch::ErasedBuffer::UInt16($ranked) => $body,
            $crate::dispatch::ErasedBuffer::UInt32($ranked) => $body,
            $crate::dispatch::ErasedBuffer::UInt64($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Float32($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Float64($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Complex64($ranked) => $body,
            $crate::dispatch::ErasedBuffer::Complex128($ranked) => $body,
        }
    };
}

pub(crate) use match_buffer;

// ============================================================================
// Ranked - rank-erased typed buffer
// ============================================================================

/// A native array of element type `T`, with the rank as the variant.
#[derive(Debug)]
pub enum Ranked<T> {
    R1(NativeArray<T, Ix1>),
    R2(NativeArray<T, Ix2>),
    R3(NativeArray<T, Ix3>),
    R4(NativeArray<T, Ix4>),
}

fn read<T: Element, D: FixedRank>(array: &NativeArray<T, D>, position: &[usize]) -> Result<T, NativeError> {
    array.get(D::from_axes(position)?)
}

fn write<T: Element, D: FixedRank>(
    array: &NativeArray<T, D>,
    position: &[usize],
    value: T,
) -> Result<(), NativeError> {
    array.set(D::from_axes(position)?, value)
}

impl<T: Element> Ranked<T> {
    /// Number of axes
    pub fn rank(&self) -> usize {
        match self {
            Ranked::R1(_) => 1,
            Ranked::R2(_) => 2,
            Ranked::R3(_) => 3,
            Ranked::R4(_) => 4,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match_ranked!(self, |array| array.shape())
    }

    pub fn byte_strides(&self) -> Vec<isize> {
        match_ranked!(self, |array| array.byte_strides())
    }

    pub fn as_ptr(&self) -> *mut T {
        match_ranked!(self, |array| array.as_ptr())
    }

    pub fn is_owned(&self) -> bool {
        match_ranked!(self, |array| array.is_owned())
    }

    pub fn is_writeable(&self) -> bool {
        match_ranked!(self, |array| array.is_writeable())
    }

    pub fn is_behaved(&self) -> bool {
        match_ranked!(self, |array| array.is_behaved())
    }

    /// Read the element at a non-negative position
    pub fn get(&self, position: &[usize]) -> Result<T, NativeError> {
        match_ranked!(self, |array| read(array, position))
    }

    /// Write the element at a non-negative position
    pub fn set(&self, position: &[usize], value: T) -> Result<(), NativeError> {
        match_ranked!(self, |array| write(array, position, value))
    }

    /// Elements in logical row-major order
    pub fn to_row_major(&self) -> Vec<T> {
        match_ranked!(self, |array| array.to_row_major())
    }
}

// ============================================================================
// ErasedBuffer - kind- and rank-erased buffer
// ============================================================================

/// A native array with both element kind and rank erased.
///
/// Dropping the value runs the destructor of the exact `NativeArray<T, D>`
/// the variants select.
#[derive(Debug)]
pub enum ErasedBuffer {
    Bool(Ranked<bool>),
    Int8(Ranked<i8>),
    Int16(Ranked<i16>),
    Int32(Ranked<i32>),
    Int64(Ranked<i64>),
    UInt8(Ranked<u8>),
    UInt16(Ranked<u16>),
    UInt32(Ranked<u32>),
    UInt64(Ranked<u64>),
    Float32(Ranked<f32>),
    Float64(Ranked<f64>),
    Complex64(Ranked<Complex<f32>>),
    Complex128(Ranked<Complex<f64>>),
}

fn kind_of<T: Element>(_: &Ranked<T>) -> ElementKind {
    T::KIND
}

impl ErasedBuffer {
    pub fn kind(&self) -> ElementKind {
        match_buffer!(self, |ranked| kind_of(ranked))
    }

    pub fn rank(&self) -> usize {
        match_buffer!(self, |ranked| ranked.rank())
    }

    pub fn shape(&self) -> &[usize] {
        match_buffer!(self, |ranked| ranked.shape())
    }

    pub fn byte_strides(&self) -> Vec<isize> {
        match_buffer!(self, |ranked| ranked.byte_strides())
    }

    /// Address of the first element
    pub fn data_ptr(&self) -> *mut u8 {
        match_buffer!(self, |ranked| ranked.as_ptr().cast::<u8>())
    }

    pub fn is_owned(&self) -> bool {
        match_buffer!(self, |ranked| ranked.is_owned())
    }

    pub fn is_writeable(&self) -> bool {
        match_buffer!(self, |ranked| ranked.is_writeable())
    }

    pub fn is_behaved(&self) -> bool {
        match_buffer!(self, |ranked| ranked.is_behaved())
    }

    /// Read one element as a host scalar of the matching kind
    pub fn read(&self, position: &[usize]) -> Result<HostScalar, NativeError> {
        match_buffer!(self, |ranked| ranked.get(position).map(HostElement::into_scalar))
    }
}

// ============================================================================
// Construction
// ============================================================================

fn allocate_typed<T: Element, D: FixedRank>(extents: &[usize]) -> Result<ErasedBuffer, NativeError> {
    NativeArray::<T, D>::zeros(extents).map(|array| T::erase(D::wrap(array)))
}

/// Allocate a default-initialized buffer for a runtime (kind, rank) pair
pub fn allocate(kind: ElementKind, rank: usize, extents: &[usize]) -> Result<ErasedBuffer, NativeError> {
    with_element_type!(kind, |T| {
        with_rank!(
            rank,
            |D| allocate_typed::<T, D>(extents),
            Err(NativeError::UnsupportedRank { rank })
        )
    })
}

unsafe fn borrow_typed<T: Element, D: FixedRank>(
    data: NonNull<u8>,
    extents: &[usize],
    byte_strides: &[isize],
    writeable: bool,
) -> Result<ErasedBuffer, NativeError> {
    NativeArray::<T, D>::borrow_host(data, extents, byte_strides, writeable)
        .map(|array| T::erase(D::wrap(array)))
}

/// Wrap host memory as a buffer for a runtime (kind, rank) pair.
///
/// # Safety
///
/// Same contract as [`NativeArray::borrow_host`].
pub unsafe fn borrow(
    kind: ElementKind,
    rank: usize,
    data: NonNull<u8>,
    extents: &[usize],
    byte_strides: &[isize],
    writeable: bool,
) -> Result<ErasedBuffer, NativeError> {
    with_element_type!(kind, |T| {
        with_rank!(
            rank,
            |D| borrow_typed::<T, D>(data, extents, byte_strides, writeable),
            Err(NativeError::UnsupportedRank { rank })
        )
    })
}

// ============================================================================
// Guards
// ============================================================================

/// Reject ranks outside `[1, MAX_RANK]`
pub fn check_rank(op: Op, rank: usize, kind: &str) -> BridgeResult<()> {
    if (1..=MAX_RANK).contains(&rank) {
        Ok(())
    } else {
        Err(BridgeError::unsupported_rank(op, rank, kind))
    }
}

/// Run a specialized path, trapping engine failures and panics.
///
/// A [`NativeError`] or a panic with a text payload becomes a `Runtime`
/// error carrying that text; any other panic becomes a generic one.
pub fn guard<R, F>(op: Op, kind: ElementKind, rank: usize, f: F) -> BridgeResult<R>
where
    F: FnOnce() -> Result<R, NativeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(BridgeError::runtime(
            op,
            kind,
            rank,
            Some(SmolStr::new(err.to_string())),
        )),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<String>()
                .map(SmolStr::new)
                .or_else(|| payload.downcast_ref::<&str>().map(|s| SmolStr::new(*s)));
            warn!(
                %op,
                kind = %kind,
                rank,
                detail = detail.as_deref().unwrap_or("unknown panic"),
                "native engine panicked"
            );
            Err(BridgeError::runtime(op, kind, rank, detail))
        }
    }
}
