//! Host Arrays
//!
//! The host's n-dimensional array: a descriptor, a runtime shape, byte
//! strides and a data pointer. An array either owns its buffer or looks at
//! memory owned by something else, in which case a *base object* keeps that
//! memory alive.
//!
//! ## Ownership
//!
//! - `HostArray` is a reference-counted handle; clone and drop adjust the
//!   count, [`HostArray::ref_count`] reports it
//! - Views ([`HostArray::slice_axis`], [`HostArray::transpose`]) hold their
//!   parent as base
//! - Foreign memory ([`HostArray::from_raw_parts`]) is kept alive by
//!   whatever object is attached with [`HostArray::set_base_object`]
//!
//! ## Memory Layout
//!
//! Flags follow the usual rules: an axis of extent one never breaks
//! contiguity, and an empty array is contiguous in both orders.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::BitOr;
use std::ptr::{self, NonNull};
use std::rc::{Rc, Weak};

use crate::element::HostElement;
use crate::error::{HostError, HostResult};
use crate::tag::{Descriptor, ScalarClass, TypeTag};
use crate::value::{HostScalar, HostValue};

/// Any reference-counted host object, used for base links.
pub type HostObject = Rc<dyn Any>;

/// Alignment of buffers allocated by the host
const BUFFER_ALIGN: usize = 16;

thread_local! {
    static LIVE_BUFFERS: Cell<usize> = const { Cell::new(0) };
}

/// Number of host-owned buffers currently allocated on this thread
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.with(Cell::get)
}

// ============================================================================
// HostBuffer - owned, zero-initialized storage
// ============================================================================

#[derive(Debug)]
struct HostBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl HostBuffer {
    fn zeroed(nbytes: usize) -> HostResult<Self> {
        let layout = Layout::from_size_align(nbytes.max(1), BUFFER_ALIGN)
            .map_err(|_| HostError::memory(format!("cannot allocate {nbytes} bytes")))?;
        // SAFETY: the layout size is at least one byte
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| HostError::memory(format!("cannot allocate {nbytes} bytes")))?;
        LIVE_BUFFERS.with(|n| n.set(n.get() + 1));
        Ok(Self { ptr, layout })
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr came from alloc_zeroed with this exact layout
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        LIVE_BUFFERS.with(|n| n.set(n.get() - 1));
    }
}

// ============================================================================
// ArrayFlags
// ============================================================================

/// Layout and ownership flags of a host array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayFlags(u8);

impl ArrayFlags {
    /// Row-major contiguous
    pub const C_CONTIGUOUS: ArrayFlags = ArrayFlags(1);
    /// Column-major contiguous
    pub const F_CONTIGUOUS: ArrayFlags = ArrayFlags(1 << 1);
    /// Data pointer and strides respect the element alignment
    pub const ALIGNED: ArrayFlags = ArrayFlags(1 << 2);
    /// Elements may be assigned
    pub const WRITEABLE: ArrayFlags = ArrayFlags(1 << 3);
    /// The array frees its buffer when dropped
    pub const OWNDATA: ArrayFlags = ArrayFlags(1 << 4);

    const NAMES: [(ArrayFlags, &'static str); 5] = [
        (ArrayFlags::C_CONTIGUOUS, "C_CONTIGUOUS"),
        (ArrayFlags::F_CONTIGUOUS, "F_CONTIGUOUS"),
        (ArrayFlags::ALIGNED, "ALIGNED"),
        (ArrayFlags::WRITEABLE, "WRITEABLE"),
        (ArrayFlags::OWNDATA, "OWNDATA"),
    ];

    /// No flags set
    pub const fn empty() -> Self {
        ArrayFlags(0)
    }

    /// Check if every flag in `other` is set
    pub fn contains(self, other: ArrayFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn with(self, other: ArrayFlags, on: bool) -> Self {
        if on {
            ArrayFlags(self.0 | other.0)
        } else {
            ArrayFlags(self.0 & !other.0)
        }
    }
}

impl BitOr for ArrayFlags {
    type Output = ArrayFlags;

    fn bitor(self, rhs: ArrayFlags) -> ArrayFlags {
        ArrayFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ArrayFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

fn is_contiguous<I>(shape: &[usize], strides: &[isize], itemsize: usize, axes: I) -> bool
where
    I: Iterator<Item = usize>,
{
    if shape.contains(&0) {
        return true;
    }
    let mut expected = itemsize as isize;
    for axis in axes {
        if shape[axis] == 1 {
            continue;
        }
        if strides[axis] != expected {
            return false;
        }
        expected *= shape[axis] as isize;
    }
    true
}

fn is_aligned(descr: &Descriptor, shape: &[usize], strides: &[isize], data: NonNull<u8>) -> bool {
    let align = descr.alignment().max(1);
    data.as_ptr() as usize % align == 0
        && shape
            .iter()
            .zip(strides)
            .all(|(&dim, &stride)| dim <= 1 || stride % align as isize == 0)
}

fn c_strides(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut stride = itemsize as isize;
    for (axis, &dim) in shape.iter().enumerate().rev() {
        strides[axis] = stride;
        stride *= dim.max(1) as isize;
    }
    strides
}

fn checked_size(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

macro_rules! with_class_type {
    ($class:expr, |$t:ident| $body:expr) => {
        match $class {
            ScalarClass::Bool => {
                type $t = bool;
                $body
            }
            ScalarClass::Signed(8) => {
                type $t = i8;
                $body
            }
            ScalarClass::Signed(16) => {
                type $t = i16;
                $body
            }
            ScalarClass::Signed(32) => {
                type $t = i32;
                $body
            }
            ScalarClass::Signed(64) => {
                type $t = i64;
                $body
            }
            ScalarClass::Unsigned(8) => {
                type $t = u8;
                $body
            }
            ScalarClass::Unsigned(16) => {
                type $t = u16;
                $body
            }
            ScalarClass::Unsigned(32) => {
                type $t = u32;
                $body
            }
            ScalarClass::Unsigned(64) => {
                type $t = u64;
                $body
            }
            ScalarClass::Float(32) => {
                type $t = f32;
                $body
            }
            ScalarClass::Float(64) => {
                type $t = f64;
                $body
            }
            ScalarClass::Complex(64) => {
                type $t = num_complex::Complex<f32>;
                $body
            }
            ScalarClass::Complex(128) => {
                type $t = num_complex::Complex<f64>;
                $body
            }
            other => Err(HostError::not_implemented(format!(
                "element access is not available for '{}'",
                other
            ))),
        }
    };
}

// ============================================================================
// HostArray
// ============================================================================

#[derive(Debug)]
struct ArrayObject {
    descr: Descriptor,
    shape: Vec<usize>,
    strides: Vec<isize>,
    data: NonNull<u8>,
    flags: Cell<ArrayFlags>,
    base: RefCell<Option<HostObject>>,
    // Held only so the memory is freed with the array
    _buffer: Option<HostBuffer>,
}

/// Reference-counted host array.
#[derive(Clone)]
pub struct HostArray {
    inner: Rc<ArrayObject>,
}

/// Non-owning reference to a host array
#[derive(Clone)]
pub struct WeakHostArray {
    inner: Weak<ArrayObject>,
}

impl WeakHostArray {
    /// Get the array back if it is still alive
    pub fn upgrade(&self) -> Option<HostArray> {
        self.inner.upgrade().map(|inner| HostArray { inner })
    }

    /// Number of strong references left
    pub fn strong_count(&self) -> usize {
        self.inner.strong_count()
    }
}

impl HostArray {
    fn assemble(
        descr: Descriptor,
        shape: Vec<usize>,
        strides: Vec<isize>,
        data: NonNull<u8>,
        writeable: bool,
        buffer: Option<HostBuffer>,
    ) -> Self {
        let itemsize = descr.itemsize();
        let flags = ArrayFlags::empty()
            .with(
                ArrayFlags::C_CONTIGUOUS,
                is_contiguous(&shape, &strides, itemsize, (0..shape.len()).rev()),
            )
            .with(
                ArrayFlags::F_CONTIGUOUS,
                is_contiguous(&shape, &strides, itemsize, 0..shape.len()),
            )
            .with(ArrayFlags::ALIGNED, is_aligned(&descr, &shape, &strides, data))
            .with(ArrayFlags::WRITEABLE, writeable)
            .with(ArrayFlags::OWNDATA, buffer.is_some());

        Self {
            inner: Rc::new(ArrayObject {
                descr,
                shape,
                strides,
                data,
                flags: Cell::new(flags),
                base: RefCell::new(None),
                _buffer: buffer,
            }),
        }
    }

    /// Create a zero-filled, C-contiguous array that owns its buffer
    pub fn zeros(descr: Descriptor, shape: &[usize]) -> HostResult<Self> {
        if !descr.is_numeric() {
            return Err(HostError::type_error(format!(
                "cannot store '{}' elements in an array",
                descr
            )));
        }
        let nbytes = checked_size(shape)
            .and_then(|n| n.checked_mul(descr.itemsize()))
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| HostError::value_error("array is too big"))?;

        let buffer = HostBuffer::zeroed(nbytes)?;
        let strides = c_strides(shape, descr.itemsize());
        Ok(Self::assemble(descr, shape.to_vec(), strides, buffer.ptr, true, Some(buffer)))
    }

    /// Create a C-contiguous array from row-major data
    pub fn from_vec<E: HostElement>(shape: &[usize], data: Vec<E>) -> HostResult<Self> {
        if checked_size(shape) != Some(data.len()) {
            return Err(HostError::value_error(format!(
                "cannot reshape array of size {} into shape {:?}",
                data.len(),
                shape
            )));
        }

        let array = Self::zeros(E::descriptor()?, shape)?;
        let itemsize = array.descr().itemsize();
        let base = array.data_ptr();
        for (i, value) in data.into_iter().enumerate() {
            // SAFETY: the buffer holds data.len() elements of itemsize bytes
            unsafe { value.write(base.add(i * itemsize)) };
        }
        Ok(array)
    }

    /// Wrap memory the array does not own.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads, and for writes when `writeable`, at
    /// every byte offset reachable through `shape` and `strides`, for as
    /// long as this array or any view of it is alive. Attaching the owner
    /// of the memory with [`HostArray::set_base_object`] is the usual way
    /// to guarantee that.
    pub unsafe fn from_raw_parts(
        descr: Descriptor,
        shape: &[usize],
        strides: &[isize],
        data: NonNull<u8>,
        writeable: bool,
    ) -> HostResult<Self> {
        if shape.len() != strides.len() {
            return Err(HostError::value_error(format!(
                "shape has {} dimensions but strides has {}",
                shape.len(),
                strides.len()
            )));
        }
        if !descr.is_numeric() {
            return Err(HostError::type_error(format!(
                "cannot store '{}' elements in an array",
                descr
            )));
        }
        Ok(Self::assemble(
            descr,
            shape.to_vec(),
            strides.to_vec(),
            data,
            writeable,
            None,
        ))
    }

    /// Attach the object that keeps this array's memory alive.
    ///
    /// Fails if the array owns its data, already has a base, or `base` is
    /// the array itself.
    pub fn set_base_object(&self, base: HostObject) -> HostResult<()> {
        if self.owns_data() {
            return Err(HostError::value_error(
                "cannot set the base of an array that owns its data",
            ));
        }
        if Rc::as_ptr(&base) as *const () == Rc::as_ptr(&self.inner) as *const () {
            return Err(HostError::value_error("cannot set an array's base to itself"));
        }
        let mut slot = self.inner.base.borrow_mut();
        if slot.is_some() {
            return Err(HostError::value_error("array base is already set"));
        }
        *slot = Some(base);
        Ok(())
    }

    /// Change the writeable flag.
    ///
    /// A view cannot become writeable when its base array is read-only.
    pub fn set_writeable(&self, writeable: bool) -> HostResult<()> {
        if writeable && self.base_array().is_some_and(|base| !base.is_writeable()) {
            return Err(HostError::value_error(
                "cannot set WRITEABLE flag to True of this array",
            ));
        }
        let flags = self.flags().with(ArrayFlags::WRITEABLE, writeable);
        self.inner.flags.set(flags);
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    fn view(&self, data: NonNull<u8>, shape: Vec<usize>, strides: Vec<isize>) -> Self {
        let view = Self::assemble(self.descr(), shape, strides, data, self.is_writeable(), None);
        *view.inner.base.borrow_mut() = Some(self.as_object());
        view
    }

    fn offset_data(&self, offset: isize) -> HostResult<NonNull<u8>> {
        NonNull::new(self.data_ptr().wrapping_offset(offset))
            .ok_or_else(|| HostError::runtime("view data pointer is null"))
    }

    /// View of `len` elements along `axis`, starting at `start` and moving
    /// `step` elements at a time. Negative steps walk backwards.
    pub fn slice_axis(&self, axis: usize, start: usize, len: usize, step: isize) -> HostResult<Self> {
        let extent = *self.shape().get(axis).ok_or_else(|| {
            HostError::index_error(format!(
                "axis {} is out of bounds for array of dimension {}",
                axis,
                self.ndim()
            ))
        })?;
        if step == 0 {
            return Err(HostError::value_error("slice step cannot be zero"));
        }

        let in_bounds = if len == 0 {
            start <= extent
        } else {
            let last = (len as isize - 1)
                .checked_mul(step)
                .and_then(|delta| (start as isize).checked_add(delta));
            start < extent && matches!(last, Some(last) if last >= 0 && last < extent as isize)
        };
        if !in_bounds {
            return Err(HostError::index_error(format!(
                "slice of {} elements from {} by {} is out of bounds for axis {} with size {}",
                len, start, step, axis, extent
            )));
        }

        let stride = self.inner.strides[axis];
        let data = self.offset_data(start as isize * stride)?;
        let mut shape = self.shape().to_vec();
        let mut strides = self.strides().to_vec();
        shape[axis] = len;
        strides[axis] = stride * step;
        Ok(self.view(data, shape, strides))
    }

    /// View with the axes reversed
    pub fn transpose(&self) -> Self {
        let shape = self.shape().iter().rev().copied().collect();
        let strides = self.strides().iter().rev().copied().collect();
        self.view(self.inner.data, shape, strides)
    }

    /// View of entry `i` along the first axis, one dimension smaller
    pub fn subarray(&self, i: usize) -> HostResult<Self> {
        let extent = self.shape().first().copied().unwrap_or(0);
        if i >= extent {
            return Err(HostError::index_error(format!(
                "index {} is out of bounds for axis 0 with size {}",
                i, extent
            )));
        }
        let data = self.offset_data(i as isize * self.strides()[0])?;
        Ok(self.view(data, self.shape()[1..].to_vec(), self.strides()[1..].to_vec()))
    }

    /// Owned, C-contiguous copy of the array
    pub fn copy(&self) -> HostResult<Self> {
        let copy = Self::zeros(self.descr(), self.shape())?;
        let itemsize = self.descr().itemsize();
        let dst = copy.data_ptr();
        for (i, offset) in self.offsets().into_iter().enumerate() {
            // SAFETY: offsets stay inside the source, i < size inside the copy
            unsafe {
                ptr::copy_nonoverlapping(
                    self.data_ptr().wrapping_offset(offset),
                    dst.add(i * itemsize),
                    itemsize,
                );
            }
        }
        Ok(copy)
    }

    // ========================================================================
    // Object protocol
    // ========================================================================

    /// Type-erased handle to this array
    pub fn as_object(&self) -> HostObject {
        self.inner.clone()
    }

    /// Recover an array from a type-erased object
    pub fn from_object(object: &HostObject) -> Option<Self> {
        object
            .clone()
            .downcast::<ArrayObject>()
            .ok()
            .map(|inner| HostArray { inner })
    }

    /// The object keeping this array's memory alive, if any
    pub fn base(&self) -> Option<HostObject> {
        self.inner.base.borrow().clone()
    }

    /// The base, if it is itself an array
    pub fn base_array(&self) -> Option<HostArray> {
        self.base().as_ref().and_then(Self::from_object)
    }

    /// Number of strong references to this array
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Create a weak reference
    pub fn downgrade(&self) -> WeakHostArray {
        WeakHostArray {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check if two handles refer to the same array object
    pub fn ptr_eq(&self, other: &HostArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Element descriptor
    pub fn descr(&self) -> Descriptor {
        self.inner.descr
    }

    /// Element type tag
    pub fn tag(&self) -> TypeTag {
        self.inner.descr.tag()
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.inner.shape.len()
    }

    /// Extent of each dimension
    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    /// Byte stride of each dimension
    pub fn strides(&self) -> &[isize] {
        &self.inner.strides
    }

    /// Total number of elements
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Total size of the elements in bytes
    pub fn nbytes(&self) -> usize {
        self.size() * self.descr().itemsize()
    }

    /// Pointer to the first element
    pub fn data_ptr(&self) -> *mut u8 {
        self.inner.data.as_ptr()
    }

    /// Current flags
    pub fn flags(&self) -> ArrayFlags {
        self.inner.flags.get()
    }

    pub fn is_c_contiguous(&self) -> bool {
        self.flags().contains(ArrayFlags::C_CONTIGUOUS)
    }

    pub fn is_f_contiguous(&self) -> bool {
        self.flags().contains(ArrayFlags::F_CONTIGUOUS)
    }

    pub fn is_aligned(&self) -> bool {
        self.flags().contains(ArrayFlags::ALIGNED)
    }

    pub fn is_writeable(&self) -> bool {
        self.flags().contains(ArrayFlags::WRITEABLE)
    }

    pub fn owns_data(&self) -> bool {
        self.flags().contains(ArrayFlags::OWNDATA)
    }

    /// C-contiguous and aligned; writeability not required
    pub fn is_carray_ro(&self) -> bool {
        self.flags()
            .contains(ArrayFlags::C_CONTIGUOUS | ArrayFlags::ALIGNED)
    }

    // ========================================================================
    // Element access
    // ========================================================================

    fn class(&self) -> HostResult<ScalarClass> {
        self.descr().class().ok_or_else(|| {
            HostError::type_error(format!("array of '{}' has no numeric elements", self.descr()))
        })
    }

    fn element_ptr(&self, index: &[usize]) -> HostResult<*mut u8> {
        if index.len() != self.ndim() {
            return Err(HostError::index_error(format!(
                "expected {} indices for array of dimension {}, got {}",
                self.ndim(),
                self.ndim(),
                index.len()
            )));
        }
        let mut offset = 0isize;
        for (axis, ((&i, &extent), &stride)) in index
            .iter()
            .zip(self.shape())
            .zip(self.strides())
            .enumerate()
        {
            if i >= extent {
                return Err(HostError::index_error(format!(
                    "index {} is out of bounds for axis {} with size {}",
                    i, axis, extent
                )));
            }
            offset += i as isize * stride;
        }
        Ok(self.data_ptr().wrapping_offset(offset))
    }

    /// Byte offsets of every element in row-major order
    fn offsets(&self) -> Vec<isize> {
        let size = self.size();
        let mut out = Vec::with_capacity(size);
        if size == 0 {
            return out;
        }
        let shape = self.shape();
        let strides = self.strides();
        let mut index = vec![0usize; shape.len()];
        for _ in 0..size {
            out.push(
                index
                    .iter()
                    .zip(strides)
                    .map(|(&i, &stride)| i as isize * stride)
                    .sum(),
            );
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        out
    }

    /// Read one element as a typed scalar
    pub fn item(&self, index: &[usize]) -> HostResult<HostScalar> {
        let ptr = self.element_ptr(index)?;
        with_class_type!(self.class()?, |E| {
            // SAFETY: element_ptr checked every coordinate against the shape
            Ok(unsafe { E::read(ptr) }.into_scalar())
        })
    }

    /// Assign one element, coercing `value` to the element type
    pub fn set_item(&self, index: &[usize], value: &HostValue) -> HostResult<()> {
        if !self.is_writeable() {
            return Err(HostError::value_error("assignment destination is read-only"));
        }
        let ptr = self.element_ptr(index)?;
        with_class_type!(self.class()?, |E| {
            let element = E::from_value(value)?;
            // SAFETY: element_ptr checked every coordinate against the shape
            unsafe { element.write(ptr) };
            Ok(())
        })
    }

    fn check_element<E: HostElement>(&self) -> HostResult<()> {
        if self.class()? == E::CLASS {
            Ok(())
        } else {
            Err(HostError::type_error(format!(
                "array of '{}' cannot be read as '{}'",
                self.descr(),
                E::CLASS
            )))
        }
    }

    /// Read one element as a Rust value of the matching type
    pub fn get<E: HostElement>(&self, index: &[usize]) -> HostResult<E> {
        self.check_element::<E>()?;
        let ptr = self.element_ptr(index)?;
        // SAFETY: bounds checked, element type matches the descriptor
        Ok(unsafe { E::read(ptr) })
    }

    /// Copy every element out in row-major order
    pub fn to_vec<E: HostElement>(&self) -> HostResult<Vec<E>> {
        self.check_element::<E>()?;
        let base = self.data_ptr();
        Ok(self
            .offsets()
            .into_iter()
            // SAFETY: offsets only visit elements inside the shape
            .map(|offset| unsafe { E::read(base.wrapping_offset(offset)) })
            .collect())
    }
}

impl fmt::Display for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ndarray(shape={:?}, dtype={})", self.shape(), self.descr())
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("dtype", &self.descr().name())
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("flags", &self.flags().to_string())
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use pretty_assertions::assert_eq;

    fn iota(rows: usize, cols: usize) -> HostArray {
        let data: Vec<i32> = (0..(rows * cols) as i32).collect();
        HostArray::from_vec(&[rows, cols], data).unwrap()
    }

    #[test]
    fn test_zeros_layout() {
        let array = HostArray::zeros(Descriptor::new(TypeTag::Double), &[2, 3]).unwrap();
        assert_eq!(array.strides(), &[24, 8]);
        assert_eq!(array.nbytes(), 48);
        assert!(array.is_c_contiguous());
        assert!(!array.is_f_contiguous());
        assert!(array.is_aligned());
        assert!(array.owns_data());
        assert_eq!(array.to_vec::<f64>().unwrap(), vec![0.0; 6]);
    }

    #[test]
    fn test_from_vec_checks_size() {
        let err = HostArray::from_vec(&[2, 2], vec![1u8, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::ValueError);
        assert_eq!(err.message(), "cannot reshape array of size 3 into shape [2, 2]");
    }

    #[test]
    fn test_object_arrays_rejected() {
        let err = HostArray::zeros(Descriptor::new(TypeTag::Object), &[1]).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_buffers_are_counted() {
        let before = live_buffers();
        let array = iota(2, 2);
        let view = array.transpose();
        assert_eq!(live_buffers(), before + 1);
        drop(array);
        assert_eq!(live_buffers(), before + 1);
        drop(view);
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_strided_slice() {
        let array = iota(3, 4);
        let cols = array.slice_axis(1, 0, 2, 2).unwrap();
        assert_eq!(cols.shape(), &[3, 2]);
        assert_eq!(cols.strides(), &[16, 8]);
        assert!(!cols.is_c_contiguous());
        assert!(cols.is_aligned());
        assert!(!cols.owns_data());
        assert_eq!(cols.to_vec::<i32>().unwrap(), vec![0, 2, 4, 6, 8, 10]);
        assert!(cols.base_array().is_some_and(|base| base.ptr_eq(&array)));
    }

    #[test]
    fn test_reversed_slice() {
        let array = HostArray::from_vec(&[4], vec![1i64, 2, 3, 4]).unwrap();
        let reversed = array.slice_axis(0, 3, 4, -1).unwrap();
        assert_eq!(reversed.strides(), &[-8]);
        assert_eq!(reversed.to_vec::<i64>().unwrap(), vec![4, 3, 2, 1]);

        let err = array.slice_axis(0, 1, 3, -1).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::IndexError);
    }

    #[test]
    fn test_transpose_is_fortran_ordered() {
        let t = iota(2, 3).transpose();
        assert_eq!(t.shape(), &[3, 2]);
        assert!(t.is_f_contiguous());
        assert!(!t.is_c_contiguous());
        assert_eq!(t.get::<i32>(&[2, 1]).unwrap(), 5);
        assert_eq!(t.copy().unwrap().to_vec::<i32>().unwrap(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_single_row_is_contiguous_both_ways() {
        let row = iota(1, 4);
        assert!(row.is_c_contiguous());
        let column = iota(4, 1);
        assert!(column.is_f_contiguous());
        let empty = HostArray::zeros(Descriptor::new(TypeTag::Float), &[0, 3]).unwrap();
        assert!(empty.is_c_contiguous() && empty.is_f_contiguous());
    }

    #[test]
    fn test_set_base_object_rules() {
        let owner = iota(2, 2);
        let err = owner.set_base_object(Rc::new(7u8)).unwrap_err();
        assert!(err.is_value_error());

        let view = owner.slice_axis(0, 0, 1, 1).unwrap();
        let err = view.set_base_object(Rc::new(7u8)).unwrap_err();
        assert_eq!(err.message(), "array base is already set");

        let memory = Rc::new([0u8; 8]);
        let data = NonNull::new(memory.as_ptr() as *mut u8).unwrap();
        let foreign = unsafe {
            HostArray::from_raw_parts(Descriptor::new(TypeTag::UByte), &[8], &[1], data, false)
        }
        .unwrap();
        let err = foreign.set_base_object(foreign.as_object()).unwrap_err();
        assert_eq!(err.message(), "cannot set an array's base to itself");

        foreign.set_base_object(memory.clone()).unwrap();
        assert_eq!(Rc::strong_count(&memory), 2);
        drop(foreign);
        assert_eq!(Rc::strong_count(&memory), 1);
    }

    #[test]
    fn test_item_access() {
        let array = iota(2, 3);
        assert_eq!(array.item(&[1, 2]).unwrap(), HostScalar::Int32(5));

        array.set_item(&[0, 1], &HostValue::Float(-9.7)).unwrap();
        assert_eq!(array.get::<i32>(&[0, 1]).unwrap(), -9);

        let err = array.item(&[2, 0]).unwrap_err();
        assert_eq!(err.message(), "index 2 is out of bounds for axis 0 with size 2");

        let err = array.get::<f32>(&[0, 0]).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_read_only_views() {
        let array = iota(2, 2);
        array.set_writeable(false).unwrap();
        let view = array.transpose();
        assert!(!view.is_writeable());
        assert!(view.set_writeable(true).is_err());

        let err = view.set_item(&[0, 0], &HostValue::Int(1)).unwrap_err();
        assert_eq!(err.message(), "assignment destination is read-only");
    }

    #[test]
    fn test_subarray() {
        let array = iota(3, 2);
        let row = array.subarray(2).unwrap();
        assert_eq!(row.shape(), &[2]);
        assert_eq!(row.to_vec::<i32>().unwrap(), vec![4, 5]);
        assert!(array.subarray(3).is_err());
    }

    #[test]
    fn test_flags_display() {
        let array = iota(1, 1);
        assert_eq!(
            array.flags().to_string(),
            "C_CONTIGUOUS | F_CONTIGUOUS | ALIGNED | WRITEABLE | OWNDATA"
        );
        assert_eq!(array.to_string(), "ndarray(shape=[1, 1], dtype=int32)");
    }
}
