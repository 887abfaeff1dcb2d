//! # ndbridge-host
//!
//! In-process model of a dynamically typed array runtime.
//!
//! Arrays here carry their element type, rank, shape and strides as
//! runtime values, the way an interpreter's array objects do. The
//! `ndbridge` crate converts between these and statically typed native
//! arrays.
//!
//! ## Module Structure
//!
//! - [`tag`]: type tags, platform C widths and descriptors
//! - [`value`]: dynamically typed host values and typed scalars
//! - [`element`]: Rust element types and the scalar coercion rules
//! - [`array`]: reference-counted strided arrays with base objects
//! - [`error`]: host exceptions and the pending-error slot

pub mod array;
pub mod element;
pub mod error;
pub mod tag;
pub mod value;

// Re-export main types for convenience
pub use array::{live_buffers, ArrayFlags, HostArray, HostObject, WeakHostArray};
pub use element::HostElement;
pub use error::{ExceptionKind, HostError, HostResult};
pub use tag::{CTypeWidths, Descriptor, ScalarClass, TypeTag};
pub use value::{HostScalar, HostValue, Numeric};
