//! Host Exceptions
//!
//! Errors raised by the host runtime. Every host failure carries one of a
//! fixed set of exception kinds, mirroring how the host reports problems
//! to its callers.
//!
//! ## Pending Error Slot
//!
//! Code that signals failure through a sentinel return (for example a
//! converter that returns `false`) leaves the exception in a thread-local
//! slot instead, managed by [`HostError::restore`] and [`HostError::fetch`].

use std::cell::RefCell;
use std::fmt;

use smol_str::SmolStr;
use thiserror::Error;

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Kind of host exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Wrong type of argument
    TypeError,
    /// Right type, bad value
    ValueError,
    /// Sequence position out of range
    IndexError,
    /// Number too large for the target type
    OverflowError,
    /// Feature not available on this platform
    NotImplementedError,
    /// Unclassified failure
    RuntimeError,
    /// Allocation failure
    MemoryError,
}

impl ExceptionKind {
    /// The host-visible exception name
    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::NotImplementedError => "NotImplementedError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::MemoryError => "MemoryError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host exception with its message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct HostError {
    kind: ExceptionKind,
    message: SmolStr,
}

impl HostError {
    /// Create an exception of the given kind
    pub fn new(kind: ExceptionKind, message: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a `TypeError`
    pub fn type_error(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    /// Create a `ValueError`
    pub fn value_error(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    /// Create an `IndexError`
    pub fn index_error(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::IndexError, message)
    }

    /// Create an `OverflowError`
    pub fn overflow(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::OverflowError, message)
    }

    /// Create a `NotImplementedError`
    pub fn not_implemented(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::NotImplementedError, message)
    }

    /// Create a `RuntimeError`
    pub fn runtime(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::RuntimeError, message)
    }

    /// Create a `MemoryError`
    pub fn memory(message: impl Into<SmolStr>) -> Self {
        Self::new(ExceptionKind::MemoryError, message)
    }

    /// Exception kind
    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    /// Exception message without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check the exception kind
    pub fn is(&self, kind: ExceptionKind) -> bool {
        self.kind == kind
    }

    /// Check if this is a `TypeError`
    pub fn is_type_error(&self) -> bool {
        self.is(ExceptionKind::TypeError)
    }

    /// Check if this is a `ValueError`
    pub fn is_value_error(&self) -> bool {
        self.is(ExceptionKind::ValueError)
    }
}

// ============================================================================
// Pending Error Slot
// ============================================================================

thread_local! {
    static PENDING: RefCell<Option<HostError>> = const { RefCell::new(None) };
}

impl HostError {
    /// Make this the pending exception for the current thread, replacing
    /// any previous one
    pub fn restore(self) {
        PENDING.with(|slot| *slot.borrow_mut() = Some(self));
    }

    /// Check if an exception is pending on this thread
    pub fn occurred() -> bool {
        PENDING.with(|slot| slot.borrow().is_some())
    }

    /// Take the pending exception, leaving the slot empty
    pub fn fetch() -> Option<HostError> {
        PENDING.with(|slot| slot.borrow_mut().take())
    }

    /// Discard the pending exception
    pub fn clear() {
        PENDING.with(|slot| *slot.borrow_mut() = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = HostError::type_error("expected a sequence");
        assert!(err.is_type_error());
        assert_eq!(err.to_string(), "TypeError: expected a sequence");
        assert_eq!(err.message(), "expected a sequence");
    }

    #[test]
    fn test_pending_slot() {
        HostError::clear();
        assert!(!HostError::occurred());

        HostError::value_error("first").restore();
        HostError::overflow("second").restore();
        assert!(HostError::occurred());

        let err = HostError::fetch();
        assert_eq!(err.map(|e| e.kind()), Some(ExceptionKind::OverflowError));
        assert!(!HostError::occurred());
        assert!(HostError::fetch().is_none());
    }
}
