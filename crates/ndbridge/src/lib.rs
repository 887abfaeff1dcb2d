//! # ndbridge
//!
//! Converts between `ndarray` arrays, whose element type and rank are
//! compile-time parameters, and host arrays, which carry both as runtime
//! values.
//!
//! Every operation on a [`Handle`] dispatches its runtime (kind, rank) pair
//! to one of 13 x 4 monomorphized code paths. Data crosses between the
//! two sides either as a deep copy or as a zero-copy alias that keeps the
//! owning side alive.
//!
//! ## Module Structure
//!
//! - [`kind`]: element kinds and host tag normalization
//! - [`dispatch`]: the (kind, rank) matrix and its failure guard
//! - [`native`]: fixed-rank native arrays over `ndarray`
//! - [`handle`]: reference-counted handles and element access
//! - [`convert`]: copies and aliases in both directions
//! - [`coerce`]: shape, index and dtype coercion of host values
//! - [`error`]: bridge errors and their host exception mapping
//!
//! ## Example
//!
//! ```
//! use ndbridge::{ElementKind, Handle};
//! use ndbridge_host::{HostScalar, HostValue};
//!
//! let handle = Handle::allocate(ElementKind::Float64, 2, &[2, 3]).unwrap();
//! handle.set(&[-1, -1], &HostValue::Float(2.5)).unwrap();
//!
//! let view = handle.to_host_alias().unwrap();
//! assert_eq!(view.item(&[1, 2]).unwrap(), HostScalar::Float64(2.5));
//! ```

pub mod coerce;
pub mod convert;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod handle;
pub mod kind;
pub mod native;

/// Highest rank with a native specialization
pub const MAX_RANK: usize = 4;

// Re-export main types for convenience
pub use coerce::{coerce_index, coerce_shape, kind_from_value, Position, Shape};
pub use convert::host_array_is_behaved;
pub use dispatch::{ErasedBuffer, Ranked};
pub use element::Element;
pub use error::{BridgeError, BridgeResult, ErrorCategory, Op};
pub use handle::{Handle, WeakHandle};
pub use kind::{kind_from_descriptor, normalize, normalize_with, ElementKind};
pub use native::{live_buffers, NativeArray, NativeError};
