//! Shape and Index Coercion
//!
//! Turns loosely-typed host values into validated extent and position
//! lists. A bare number is a one-element list; any host sequence of 1 to
//! [`MAX_RANK`] integers is accepted as-is.

use ndbridge_host::{Descriptor, HostValue};

use crate::error::{BridgeError, BridgeResult};
use crate::kind::{kind_from_descriptor, ElementKind};
use crate::MAX_RANK;

/// Extents of a native array, as coerced from a host value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    rank: usize,
    extents: [usize; MAX_RANK],
}

impl Shape {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents[..self.rank]
    }
}

/// Element position, possibly with negative (from the end) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    rank: usize,
    coords: [isize; MAX_RANK],
}

impl Position {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn coords(&self) -> &[isize] {
        &self.coords[..self.rank]
    }
}

/// Integers of a number-or-sequence value, before sign checks
fn coerce_axes(value: &HostValue, what: &str) -> BridgeResult<(usize, [isize; MAX_RANK])> {
    let mut axes = [0isize; MAX_RANK];

    if value.is_number() {
        axes[0] = value.as_index()?;
        return Ok((1, axes));
    }

    let Some(len) = value.seq_len() else {
        return Err(BridgeError::type_error(format!(
            "{what} must be a number or a sequence of integers"
        )));
    };
    if !(1..=MAX_RANK).contains(&len) {
        return Err(BridgeError::type_error(format!(
            "{what} must be a sequence with at least 1 and at most {MAX_RANK} element(s) (you passed a sequence with {len} elements)"
        )));
    }

    for (i, slot) in axes.iter_mut().enumerate().take(len) {
        let item = value.seq_item(i)?;
        if !item.is_number() {
            return Err(BridgeError::value_error(format!(
                "element {i} of {what} sequence should be a number (coercible to integer)"
            )));
        }
        *slot = item.as_index().map_err(|_| {
            BridgeError::type_error(format!(
                "error extracting a size from element {i} of {what} sequence"
            ))
        })?;
    }
    Ok((len, axes))
}

/// Coerce a host value into array extents.
///
/// Every extent must be zero or positive.
pub fn coerce_shape(value: &HostValue) -> BridgeResult<Shape> {
    let (rank, axes) = coerce_axes(value, "shape")?;
    let mut extents = [0usize; MAX_RANK];
    for (i, (&axis, slot)) in axes.iter().zip(&mut extents).enumerate().take(rank) {
        *slot = usize::try_from(axis).map_err(|_| {
            if value.is_number() {
                BridgeError::value_error(format!("shape values should be >= 0; {axis} is invalid"))
            } else {
                BridgeError::value_error(format!(
                    "shape sequence should only contain values >= 0; {axis} is an invalid value at position {i}"
                ))
            }
        })?;
    }
    Ok(Shape { rank, extents })
}

/// Coerce a host value into an element position.
///
/// Negative coordinates are kept; element access resolves them against the
/// array's extents.
pub fn coerce_index(value: &HostValue) -> BridgeResult<Position> {
    let (rank, coords) = coerce_axes(value, "index")?;
    Ok(Position { rank, coords })
}

/// Resolve a dtype-like host value to an element kind.
///
/// Accepts a dtype object or a dtype name such as `"float64"` or `"i4"`.
pub fn kind_from_value(value: &HostValue) -> BridgeResult<ElementKind> {
    match value {
        HostValue::Dtype(descr) => kind_from_descriptor(descr),
        HostValue::Str(name) => {
            let descr = Descriptor::from_name(name)
                .ok_or_else(|| BridgeError::unsupported_type(name.clone()))?;
            kind_from_descriptor(&descr)
        }
        HostValue::None => Err(BridgeError::type_error(
            "an element type is required, got None",
        )),
        other => Err(BridgeError::type_error(format!(
            "cannot interpret '{}' as a data type",
            other.type_name()
        ))),
    }
}
