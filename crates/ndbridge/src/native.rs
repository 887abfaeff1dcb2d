//! Native Arrays
//!
//! A [`NativeArray`] is an `ndarray` array whose element type and rank are
//! fixed at compile time. It either owns an `ndarray::Array` or is a
//! strided window over memory owned by a host array.
//!
//! ## Memory Layout
//!
//! Strides are kept in elements, never negative. Host windows with
//! negative, uneven or aliasing strides are refused at construction.

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

use ndarray::{Array, ArrayView, ArrayViewMut, Dimension, Ix1, Ix2, Ix3, Ix4, ShapeBuilder};
use thiserror::Error;

use crate::dispatch::Ranked;
use crate::element::Element;

thread_local! {
    static LIVE_BUFFERS: Cell<usize> = const { Cell::new(0) };
}

/// Number of native-owned buffers currently allocated on this thread
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.with(Cell::get)
}

/// Failure reported by the native engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error("shape {shape:?} is too large to allocate")]
    TooLarge { shape: Vec<usize> },

    #[error("expected {expected} extents, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("failed to allocate memory for shape {shape:?}")]
    AllocationFailed { shape: Vec<usize> },

    #[error("rank {rank} has no native specialization")]
    UnsupportedRank { rank: usize },

    #[error("data pointer is not aligned to {align} bytes")]
    Misaligned { align: usize },

    #[error("negative stride {stride} on axis {axis} is not supported")]
    NegativeStride { axis: usize, stride: isize },

    #[error("stride {stride} on axis {axis} is not a multiple of the {itemsize}-byte element size")]
    UnevenStride {
        axis: usize,
        stride: isize,
        itemsize: usize,
    },

    #[error("zero stride on axis {axis} would alias {extent} elements")]
    AliasedStride { axis: usize, extent: usize },

    #[error("strides {strides:?} reach the same element from more than one index")]
    OverlappingStrides { strides: Vec<isize> },

    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    OutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("array memory is read-only")]
    ReadOnly,

    #[error("array data pointer is null")]
    NullData,
}

/// An `ndarray` dimension type of fixed rank.
pub trait FixedRank: Dimension {
    /// Number of axes
    const RANK: usize;

    /// Tag a typed buffer with its rank
    fn wrap<T>(array: NativeArray<T, Self>) -> Ranked<T>;

    /// Build a shape or index from exactly `RANK` entries
    fn from_axes(values: &[usize]) -> Result<Self, NativeError> {
        if values.len() != Self::RANK {
            return Err(NativeError::RankMismatch {
                expected: Self::RANK,
                actual: values.len(),
            });
        }
        let mut dim = Self::zeros(Self::RANK);
        dim.slice_mut().copy_from_slice(values);
        Ok(dim)
    }
}

macro_rules! impl_fixed_rank {
    ($($dim:ty => $rank:literal, $variant:ident;)*) => {
        $(
            impl FixedRank for $dim {
                const RANK: usize = $rank;

                fn wrap<T>(array: NativeArray<T, Self>) -> Ranked<T> {
                    Ranked::$variant(array)
                }
            }
        )*
    };
}

impl_fixed_rank! {
    Ix1 => 1, R1;
    Ix2 => 2, R2;
    Ix3 => 3, R3;
    Ix4 => 4, R4;
}

fn c_strides<D: Dimension>(dim: &D) -> D {
    let mut strides = D::zeros(dim.ndim());
    let mut stride = 1usize;
    for (slot, &extent) in strides.slice_mut().iter_mut().zip(dim.slice()).rev() {
        *slot = stride;
        stride *= extent.max(1);
    }
    strides
}

enum Storage<T, D> {
    Owned(Array<T, D>),
    Borrowed { writeable: bool },
}

/// Native array of element type `T` and rank `D`.
pub struct NativeArray<T, D> {
    ptr: NonNull<T>,
    dim: D,
    strides: D,
    storage: Storage<T, D>,
}

impl<T: Element, D: FixedRank> NativeArray<T, D> {
    /// Allocate an array of default-valued (zero, false) elements
    pub fn zeros(extents: &[usize]) -> Result<Self, NativeError> {
        let dim = D::from_axes(extents)?;
        let too_large = || NativeError::TooLarge {
            shape: extents.to_vec(),
        };
        let size = dim
            .size_checked()
            .filter(|size| {
                size.checked_mul(mem::size_of::<T>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or_else(too_large)?;

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| NativeError::AllocationFailed {
                shape: extents.to_vec(),
            })?;
        data.resize(size, T::default());
        let mut array = Array::from_shape_vec(dim.clone(), data).map_err(|_| too_large())?;
        let ptr = NonNull::new(array.as_mut_ptr()).ok_or(NativeError::NullData)?;
        let strides = c_strides(&dim);
        LIVE_BUFFERS.with(|n| n.set(n.get() + 1));
        Ok(Self {
            ptr,
            dim,
            strides,
            storage: Storage::Owned(array),
        })
    }

    /// Wrap host memory without copying.
    ///
    /// # Safety
    ///
    /// `data` must address memory laid out as `extents` and `byte_strides`
    /// describe, valid for reads (and writes when `writeable`) for as long
    /// as the returned array is alive.
    pub unsafe fn borrow_host(
        data: NonNull<u8>,
        extents: &[usize],
        byte_strides: &[isize],
        writeable: bool,
    ) -> Result<Self, NativeError> {
        let itemsize = mem::size_of::<T>();
        let align = mem::align_of::<T>();
        if data.as_ptr() as usize % align != 0 {
            return Err(NativeError::Misaligned { align });
        }
        if byte_strides.len() != D::RANK {
            return Err(NativeError::RankMismatch {
                expected: D::RANK,
                actual: byte_strides.len(),
            });
        }

        let dim = D::from_axes(extents)?;
        let mut strides = D::zeros(D::RANK);
        for (axis, ((&stride, &extent), slot)) in byte_strides
            .iter()
            .zip(extents)
            .zip(strides.slice_mut())
            .enumerate()
        {
            // A single step never moves, so its stride is irrelevant.
            if extent <= 1 {
                continue;
            }
            if stride < 0 {
                return Err(NativeError::NegativeStride { axis, stride });
            }
            if stride % itemsize as isize != 0 {
                return Err(NativeError::UnevenStride {
                    axis,
                    stride,
                    itemsize,
                });
            }
            if stride == 0 {
                return Err(NativeError::AliasedStride { axis, extent });
            }
            *slot = stride as usize / itemsize;
        }

        // Sorted by stride, each moving axis must step past the whole span
        // of the axes below it.
        let mut moving: Vec<(usize, usize)> = strides
            .slice()
            .iter()
            .zip(extents)
            .filter(|&(_, &extent)| extent > 1)
            .map(|(&stride, &extent)| (stride, extent))
            .collect();
        moving.sort_unstable();
        for pair in moving.windows(2) {
            let (stride, extent) = pair[0];
            if pair[1].0 < stride.saturating_mul(extent) {
                return Err(NativeError::OverlappingStrides {
                    strides: byte_strides.to_vec(),
                });
            }
        }

        Ok(Self {
            ptr: data.cast::<T>(),
            dim,
            strides,
            storage: Storage::Borrowed { writeable },
        })
    }

    /// Read-only `ndarray` view of the elements
    pub fn view(&self) -> ArrayView<'_, T, D> {
        match &self.storage {
            Storage::Owned(array) => array.view(),
            // SAFETY: borrow_host's contract keeps the window valid while self lives
            Storage::Borrowed { .. } => unsafe {
                ArrayView::from_shape_ptr(
                    self.dim.clone().strides(self.strides.clone()),
                    self.ptr.as_ptr(),
                )
            },
        }
    }

    fn out_of_bounds(&self, index: &D) -> NativeError {
        NativeError::OutOfBounds {
            index: index.slice().to_vec(),
            shape: self.shape().to_vec(),
        }
    }

    /// Read one element
    pub fn get(&self, index: D) -> Result<T, NativeError> {
        let view = self.view();
        match view.get(index.clone()) {
            Some(value) => Ok(*value),
            None => Err(self.out_of_bounds(&index)),
        }
    }

    /// Write one element in place, visible through every alias
    pub fn set(&self, index: D, value: T) -> Result<(), NativeError> {
        if let Storage::Borrowed { writeable: false } = self.storage {
            return Err(NativeError::ReadOnly);
        }
        // SAFETY: dim and strides describe the live buffer; no other
        // reference to its elements outlives a single call
        let mut view = unsafe {
            ArrayViewMut::from_shape_ptr(
                self.dim.clone().strides(self.strides.clone()),
                self.ptr.as_ptr(),
            )
        };
        match view.get_mut(index.clone()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(&index)),
        }
    }

    /// Elements in logical row-major order
    pub fn to_row_major(&self) -> Vec<T> {
        self.view().iter().copied().collect()
    }

    /// Row-major contiguous with ascending strides and an aligned data pointer
    pub fn is_behaved(&self) -> bool {
        self.ptr.as_ptr() as usize % mem::align_of::<T>() == 0 && self.view().is_standard_layout()
    }
}

impl<T, D: Dimension> NativeArray<T, D> {
    /// Extent of each axis
    pub fn shape(&self) -> &[usize] {
        self.dim.slice()
    }

    /// Stride of each axis in bytes
    pub fn byte_strides(&self) -> Vec<isize> {
        self.strides
            .slice()
            .iter()
            .map(|&s| (s * mem::size_of::<T>()) as isize)
            .collect()
    }

    /// Pointer to the first element
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Check if the array owns its buffer
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Check if elements may be written
    pub fn is_writeable(&self) -> bool {
        !matches!(self.storage, Storage::Borrowed { writeable: false })
    }
}

impl<T, D> Drop for NativeArray<T, D> {
    fn drop(&mut self) {
        if matches!(self.storage, Storage::Owned(_)) {
            LIVE_BUFFERS.with(|n| n.set(n.get() - 1));
        }
    }
}

impl<T, D: Dimension> fmt::Debug for NativeArray<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeArray")
            .field("shape", &self.shape())
            .field("strides", &self.strides.slice())
            .field("owned", &self.is_owned())
            .finish()
    }
}
