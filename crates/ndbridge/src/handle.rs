//! Native Array Handles
//!
//! A [`Handle`] is the reference-counted, type-erased owner of one native
//! array. Kind, rank and shape are fixed when the handle is populated.
//! The buffer is torn down when the last clone goes away, and only then
//! is the aliased host array (if any) released.

use std::fmt;
use std::rc::{Rc, Weak};

use ndbridge_host::{Descriptor, HostObject, HostArray, HostScalar, HostValue, TypeTag};
use tracing::{debug, trace};

use crate::coerce::{coerce_index, coerce_shape};
use crate::dispatch::{self, check_rank, guard, match_buffer, ErasedBuffer, Ranked};
use crate::element::Element;
use crate::error::{BridgeError, BridgeResult, Op};
use crate::kind::{normalize, ElementKind};
use crate::MAX_RANK;

#[derive(Debug)]
struct HandleInner {
    kind: Option<ElementKind>,
    rank: usize,
    shape: [usize; MAX_RANK],
    buffer: Option<ErasedBuffer>,
    base: Option<HostArray>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            trace!(
                kind = %buffer.kind(),
                rank = buffer.rank(),
                owned = buffer.is_owned(),
                "dropping native buffer"
            );
            drop(buffer);
        }
        if let Some(base) = self.base.take() {
            trace!(refs = base.ref_count(), "releasing host base");
            drop(base);
        }
    }
}

/// Shared owner of a native array.
///
/// Cloning shares the array; it is freed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Handle {
    inner: Rc<HandleInner>,
}

/// Non-owning reference to a [`Handle`]
#[derive(Debug, Clone)]
pub struct WeakHandle {
    inner: Weak<HandleInner>,
}

impl WeakHandle {
    pub fn upgrade(&self) -> Option<Handle> {
        self.inner.upgrade().map(|inner| Handle { inner })
    }

    pub fn strong_count(&self) -> usize {
        self.inner.strong_count()
    }
}

fn store<T: Element>(
    ranked: &Ranked<T>,
    kind: ElementKind,
    position: &[usize],
    value: &HostValue,
) -> BridgeResult<()> {
    let element = T::from_value(value)?;
    guard(Op::SetItem, kind, ranked.rank(), || ranked.set(position, element))
}

impl Handle {
    // ========================================================================
    // Construction
    // ========================================================================

    /// A handle with no kind, rank or buffer
    pub fn empty() -> Self {
        Self {
            inner: Rc::new(HandleInner {
                kind: None,
                rank: 0,
                shape: [0; MAX_RANK],
                buffer: None,
                base: None,
            }),
        }
    }

    pub(crate) fn populated(buffer: ErasedBuffer, base: Option<HostArray>) -> Self {
        let rank = buffer.rank();
        let mut shape = [0; MAX_RANK];
        shape[..rank].copy_from_slice(buffer.shape());
        Self {
            inner: Rc::new(HandleInner {
                kind: Some(buffer.kind()),
                rank,
                shape,
                buffer: Some(buffer),
                base,
            }),
        }
    }

    /// Allocate a zero-filled array of `kind` with the given extents
    pub fn allocate(kind: ElementKind, rank: usize, shape: &[usize]) -> BridgeResult<Self> {
        check_rank(Op::Allocate, rank, kind.name())?;
        if shape.len() != rank {
            return Err(BridgeError::type_error(format!(
                "cannot allocate native array(@{rank},'{kind}') from a shape with {} extent(s)",
                shape.len()
            )));
        }
        let buffer = guard(Op::Allocate, kind, rank, || dispatch::allocate(kind, rank, shape))?;
        debug!(kind = %kind, rank, ?shape, "allocated native array");
        Ok(Self::populated(buffer, None))
    }

    /// Allocate with the element type given as a host type tag
    pub fn allocate_tagged(tag: TypeTag, rank: usize, shape: &[usize]) -> BridgeResult<Self> {
        let name = Descriptor::new(tag).name();
        check_rank(Op::Allocate, rank, &name)?;
        let kind = normalize(tag).map_err(|_| BridgeError::unsupported_kind(Op::Allocate, rank, name))?;
        Self::allocate(kind, rank, shape)
    }

    /// Allocate with extents coerced from a host shape value
    pub fn with_shape(kind: ElementKind, shape: &HostValue) -> BridgeResult<Self> {
        let shape = coerce_shape(shape)?;
        Self::allocate(kind, shape.rank(), shape.extents())
    }

    /// Give up this reference; the last one tears the array down
    pub fn release(self) {
        trace!(refs = self.ref_count(), "releasing native array handle");
        drop(self);
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Element kind, `None` for an empty handle
    pub fn kind(&self) -> Option<ElementKind> {
        self.inner.kind
    }

    /// Number of axes, 0 for an empty handle
    pub fn rank(&self) -> usize {
        self.inner.rank
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape[..self.inner.rank]
    }

    /// Host dtype of the elements
    pub fn descriptor(&self) -> Option<Descriptor> {
        self.kind().map(ElementKind::descriptor)
    }

    /// Shape as a host tuple of integers
    pub fn host_shape(&self) -> HostValue {
        HostValue::int_tuple(self.shape().iter().map(|&n| n as i64))
    }

    /// Host array whose memory this handle wraps
    pub fn base(&self) -> Option<HostArray> {
        self.inner.base.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.buffer.is_none()
    }

    /// Number of strong references, host-side aliases included
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Type-erased reference, suitable as a host array base
    pub fn as_object(&self) -> HostObject {
        self.inner.clone()
    }

    /// Recover the handle a host array uses as its base
    pub fn from_base(object: &HostObject) -> Option<Self> {
        object
            .clone()
            .downcast::<HandleInner>()
            .ok()
            .map(|inner| Handle { inner })
    }

    /// Kind and buffer, or the error an empty handle reports for `op`
    pub(crate) fn buffer(&self, op: Op) -> BridgeResult<(ElementKind, &ErasedBuffer)> {
        match (self.inner.kind, &self.inner.buffer) {
            (Some(kind), Some(buffer)) => Ok((kind, buffer)),
            _ => Err(BridgeError::unsupported_kind(op, self.rank(), "uninitialized")),
        }
    }

    // ========================================================================
    // Element access
    // ========================================================================

    fn resolve(&self, kind: ElementKind, position: &[isize]) -> BridgeResult<[usize; MAX_RANK]> {
        let rank = self.rank();
        if position.len() != rank {
            return Err(BridgeError::type_error(format!(
                "native array(@{rank},'{kind}') expects a position with {rank} coordinate(s), got {}",
                position.len()
            )));
        }

        let mut resolved = [0usize; MAX_RANK];
        for (axis, (&raw, &extent)) in position.iter().zip(self.shape()).enumerate() {
            let wrapped = if raw < 0 { raw + extent as isize } else { raw };
            if wrapped < 0 || wrapped as usize >= extent {
                return Err(BridgeError::Index {
                    kind,
                    rank,
                    axis,
                    raw,
                    resolved: wrapped,
                    extent,
                });
            }
            resolved[axis] = wrapped as usize;
        }
        Ok(resolved)
    }

    /// Read one element; negative coordinates count from the end
    pub fn get(&self, position: &[isize]) -> BridgeResult<HostScalar> {
        let (kind, buffer) = self.buffer(Op::Index)?;
        let resolved = self.resolve(kind, position)?;
        let resolved = &resolved[..self.rank()];
        trace!(kind = %kind, rank = self.rank(), ?resolved, "reading element");
        guard(Op::Index, kind, self.rank(), || buffer.read(resolved))
    }

    /// Write one element, coercing `value` with the host's scalar rules
    pub fn set(&self, position: &[isize], value: &HostValue) -> BridgeResult<()> {
        let (kind, buffer) = self.buffer(Op::SetItem)?;
        let resolved = self.resolve(kind, position)?;
        let resolved = &resolved[..self.rank()];
        trace!(kind = %kind, rank = self.rank(), ?resolved, "writing element");
        match_buffer!(buffer, |ranked| store(ranked, kind, resolved, value))
    }

    /// Read one element at a host index value
    pub fn get_at(&self, index: &HostValue) -> BridgeResult<HostScalar> {
        let position = coerce_index(index)?;
        self.get(position.coords())
    }

    /// Write one element at a host index value
    pub fn set_at(&self, index: &HostValue, value: &HostValue) -> BridgeResult<()> {
        let position = coerce_index(index)?;
        self.set(position.coords(), value)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "native array(@{},'{}') {:?}", self.rank(), kind, self.shape()),
            None => f.write_str("native array(uninitialized)"),
        }
    }
}
