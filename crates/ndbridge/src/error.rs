//! Error Types for the Array Bridge
//!
//! ## Error Categories
//!
//! - Unsupported rank, element kind, or host type
//! - Malformed shapes and positions (type and value errors)
//! - Out-of-range element access
//! - Failures trapped inside the native engine
//! - Host exceptions passed through unchanged

use std::fmt;

use ndbridge_host::{ExceptionKind, HostError};
use smol_str::SmolStr;
use thiserror::Error;

use crate::kind::ElementKind;
use crate::MAX_RANK;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// The bridge operation that failed, as it reads in a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Allocate,
    Index,
    SetItem,
    HostCopy,
    HostAlias,
    NativeAlias,
    Behaviour,
}

impl Op {
    fn phrase(self) -> &'static str {
        match self {
            Op::Allocate => "allocate",
            Op::Index => "index",
            Op::SetItem => "set item on",
            Op::HostCopy => "create a host array copy of",
            Op::HostAlias => "create a host array view of",
            Op::NativeAlias => "wrap a host array as",
            Op::Behaviour => "check behaviour of",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Broad class of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Unsupported,
    Type,
    Value,
    Index,
    Runtime,
    Host,
}

/// Array bridge error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Rank outside `[1, MAX_RANK]`
    #[error("cannot {op} native array(@{rank},'{kind}'): this number of dimensions is outside the range of supported dimensions [1,{max}]", max = MAX_RANK)]
    UnsupportedRank {
        op: Op,
        rank: usize,
        /// Element kind or host type name
        kind: SmolStr,
    },

    /// Element kind missing or not supported by the operation
    #[error("cannot {op} native array(@{rank},T) with T being an unsupported element type '{kind}'")]
    UnsupportedKind {
        op: Op,
        rank: usize,
        /// Host type name, or `uninitialized` for an empty handle
        kind: SmolStr,
    },

    /// Host type with no native counterpart
    #[error("no support for using host type '{0}' as a native element type")]
    UnsupportedType(SmolStr),

    /// Argument of the wrong type
    #[error("{0}")]
    Type(SmolStr),

    /// Argument with an invalid value
    #[error("{0}")]
    Value(SmolStr),

    /// Element position out of range after wraparound
    #[error("native array(@{rank},'{kind}') position {axis} is out of range: {raw} (resolved to {resolved}) not in [0,{extent})")]
    Index {
        kind: ElementKind,
        rank: usize,
        axis: usize,
        raw: isize,
        resolved: isize,
        extent: usize,
    },

    /// Failure trapped while the native engine ran
    #[error("caught {} while trying to {op} native array(@{rank},'{kind}'){}", failure_word(.detail), DetailSuffix(.detail))]
    Runtime {
        op: Op,
        kind: ElementKind,
        rank: usize,
        detail: Option<SmolStr>,
    },

    /// Exception raised by the host runtime
    #[error(transparent)]
    Host(#[from] HostError),
}

fn failure_word(detail: &Option<SmolStr>) -> &'static str {
    if detail.is_some() {
        "failure"
    } else {
        "unknown failure"
    }
}

struct DetailSuffix<'a>(&'a Option<SmolStr>);

impl fmt::Display for DetailSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(detail) => write!(f, ": {detail}"),
            None => Ok(()),
        }
    }
}

impl BridgeError {
    /// Create an unsupported rank error
    pub fn unsupported_rank(op: Op, rank: usize, kind: impl Into<SmolStr>) -> Self {
        BridgeError::UnsupportedRank {
            op,
            rank,
            kind: kind.into(),
        }
    }

    /// Create an unsupported kind error
    pub fn unsupported_kind(op: Op, rank: usize, kind: impl Into<SmolStr>) -> Self {
        BridgeError::UnsupportedKind {
            op,
            rank,
            kind: kind.into(),
        }
    }

    /// Create an unsupported host type error
    pub fn unsupported_type(name: impl Into<SmolStr>) -> Self {
        BridgeError::UnsupportedType(name.into())
    }

    /// Create a type error
    pub fn type_error(message: impl Into<SmolStr>) -> Self {
        BridgeError::Type(message.into())
    }

    /// Create a value error
    pub fn value_error(message: impl Into<SmolStr>) -> Self {
        BridgeError::Value(message.into())
    }

    /// Create a runtime error for a trapped failure
    pub fn runtime(op: Op, kind: ElementKind, rank: usize, detail: Option<SmolStr>) -> Self {
        BridgeError::Runtime {
            op,
            kind,
            rank,
            detail,
        }
    }

    /// Broad class of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::UnsupportedRank { .. }
            | BridgeError::UnsupportedKind { .. }
            | BridgeError::UnsupportedType(_) => ErrorCategory::Unsupported,
            BridgeError::Type(_) => ErrorCategory::Type,
            BridgeError::Value(_) => ErrorCategory::Value,
            BridgeError::Index { .. } => ErrorCategory::Index,
            BridgeError::Runtime { .. } => ErrorCategory::Runtime,
            BridgeError::Host(_) => ErrorCategory::Host,
        }
    }

    /// Check if this is an unsupported rank, kind or type
    pub fn is_unsupported(&self) -> bool {
        self.category() == ErrorCategory::Unsupported
    }

    /// Check if this error was raised by the host runtime
    pub fn is_host_error(&self) -> bool {
        matches!(self, BridgeError::Host(_))
    }

    /// Convert to the host exception a caller would see
    pub fn into_host_error(self) -> HostError {
        if let BridgeError::Host(err) = self {
            return err;
        }
        let kind = match self.category() {
            ErrorCategory::Unsupported => ExceptionKind::NotImplementedError,
            ErrorCategory::Type => ExceptionKind::TypeError,
            ErrorCategory::Value => ExceptionKind::ValueError,
            ErrorCategory::Index => ExceptionKind::IndexError,
            ErrorCategory::Runtime | ErrorCategory::Host => ExceptionKind::RuntimeError,
        };
        HostError::new(kind, self.to_string())
    }

    /// Store this error as the host's pending exception
    pub fn raise(self) {
        self.into_host_error().restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unsupported_rank_message() {
        let err = BridgeError::unsupported_rank(Op::Allocate, 5, "float64");
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "cannot allocate native array(@5,'float64'): this number of dimensions is outside the range of supported dimensions [1,4]"
        );
    }

    #[test]
    fn test_runtime_message() {
        let err = BridgeError::runtime(Op::HostCopy, ElementKind::Int16, 2, Some("boom".into()));
        assert_eq!(
            err.to_string(),
            "caught failure while trying to create a host array copy of native array(@2,'int16'): boom"
        );

        let err = BridgeError::runtime(Op::Allocate, ElementKind::Bool, 1, None);
        assert_eq!(
            err.to_string(),
            "caught unknown failure while trying to allocate native array(@1,'bool')"
        );
    }

    #[test]
    fn test_host_exception_mapping() {
        let cases = [
            (
                BridgeError::unsupported_kind(Op::Index, 1, "object"),
                ExceptionKind::NotImplementedError,
            ),
            (BridgeError::type_error("bad"), ExceptionKind::TypeError),
            (BridgeError::value_error("bad"), ExceptionKind::ValueError),
            (
                BridgeError::Index {
                    kind: ElementKind::Float32,
                    rank: 1,
                    axis: 0,
                    raw: -6,
                    resolved: -1,
                    extent: 5,
                },
                ExceptionKind::IndexError,
            ),
            (
                BridgeError::runtime(Op::Allocate, ElementKind::Int8, 1, None),
                ExceptionKind::RuntimeError,
            ),
            (
                BridgeError::Host(HostError::overflow("too big")),
                ExceptionKind::OverflowError,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_host_error().kind(), expected);
        }
    }

    #[test]
    fn test_host_errors_pass_through() {
        let host = HostError::type_error("'float' object cannot be interpreted as an integer");
        let err = BridgeError::from(host.clone());
        assert_eq!(err.category(), ErrorCategory::Host);
        assert_eq!(err.to_string(), host.to_string());

        HostError::clear();
        err.raise();
        assert_eq!(HostError::fetch(), Some(host));
    }
}
