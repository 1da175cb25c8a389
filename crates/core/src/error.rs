//! Error types for spool
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Callers branch on the variant: pool exhaustion, pool misuse, conflicts that
//! outlived their retry deadline and plain backend failures all stay distinct.

use crate::types::{RetryDelay, SessionId};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for spool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes reported by the backend for non-conflict failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unclassified failure
    Unknown,
    /// Backend temporarily unreachable
    Unavailable,
    /// Operation cancelled by the backend
    Cancelled,
    /// Backend-side deadline elapsed
    DeadlineExceeded,
    /// Backend invariant broken
    Internal,
    /// Request rejected as malformed
    InvalidArgument,
    /// Request rejected in the current backend state
    FailedPrecondition,
    /// Caller lacks permission
    PermissionDenied,
    /// Quota or capacity exhausted backend-side
    ResourceExhausted,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Error types for spool
#[derive(Debug, Error)]
pub enum Error {
    /// `get` timed out waiting for a session
    #[error("Pool exhausted: no session available within {timeout:?}")]
    PoolExhausted {
        /// How long the caller waited
        timeout: Duration,
    },

    /// `put` on a pool that is already at capacity
    #[error("Pool full: capacity is {capacity}")]
    PoolFull {
        /// Configured pool capacity
        capacity: usize,
    },

    /// The backend no longer knows the session
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Transaction aborted by the backend due to contention (retryable)
    #[error("Transaction aborted: {message}")]
    Aborted {
        /// Backend-provided reason
        message: String,
        /// Server-suggested delay before retrying, if any
        retry_delay: Option<RetryDelay>,
    },

    /// Any other backend failure (never retried)
    #[error("Backend error ({code}): {message}")]
    Backend {
        /// Status code
        code: ErrorCode,
        /// Backend-provided message
        message: String,
    },

    /// A retrying transaction was started from inside another one
    #[error("Nested transactions are not supported")]
    NestedTransaction,

    /// The pool has not been bound to a backend yet
    #[error("Pool is not bound to a backend")]
    NotBound,

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error raised by application code inside a unit of work
    #[error("Application error: {0}")]
    Application(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Conflict without a retry hint
    pub fn aborted(message: impl Into<String>) -> Self {
        Error::Aborted {
            message: message.into(),
            retry_delay: None,
        }
    }

    /// Conflict carrying a server retry hint
    pub fn aborted_with_delay(message: impl Into<String>, retry_delay: RetryDelay) -> Self {
        Error::Aborted {
            message: message.into(),
            retry_delay: Some(retry_delay),
        }
    }

    /// Non-conflict backend failure
    pub fn backend(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Backend {
            code,
            message: message.into(),
        }
    }

    /// Wrap an application error
    pub fn application<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Application(Box::new(err))
    }

    /// True for the backend's "aborted" conflict signal
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }

    /// True when the backend reports the session is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SessionNotFound(_))
    }

    /// Server-suggested retry delay carried by a conflict
    pub fn retry_delay(&self) -> Option<RetryDelay> {
        match self {
            Error::Aborted { retry_delay, .. } => *retry_delay,
            _ => None,
        }
    }

    /// Backend status code, for `Backend` errors
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
