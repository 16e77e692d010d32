//! Client-side task state kept in step with the server.
//!
//! - [`cache`]: the snapshot readers see and the bookkeeping behind it
//! - [`controller`]: issues requests and reconciles their results
//! - [`views`]: pure groupings and counts derived from a snapshot

pub mod cache;
pub mod controller;
pub mod views;

use std::fmt;

use crate::remote::RemoteError;

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential rejected.
    Unauthorized,
    /// Target resource missing.
    NotFound,
    /// No response received.
    Unreachable,
    /// No response within the timeout.
    Timeout,
    /// Any other server-side or response failure.
    Server,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not found"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Timeout => write!(f, "timeout"),
            Self::Server => write!(f, "server error"),
        }
    }
}

/// Error recorded by the sync controller, with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The server rejected the credential.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The resource does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server could not be reached.
    #[error("cannot reach server: {0}")]
    Unreachable(String),

    /// The server did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an error or an unusable body.
    #[error("server error: {message}")]
    Server {
        /// HTTP status, when the server answered.
        status: Option<u16>,
        /// Reason reported by the server, or a generic one.
        message: String,
    },
}

impl SyncError {
    /// The error's classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unreachable(_) => ErrorKind::Unreachable,
            Self::Timeout => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
        }
    }

    /// Whether no response was received at all.
    #[must_use]
    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout)
    }
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Unauthorized(message) => Self::Unauthorized(message),
            RemoteError::NotFound(message) => Self::NotFound(message),
            RemoteError::Unreachable(message) => Self::Unreachable(message),
            RemoteError::Timeout => Self::Timeout,
            RemoteError::Status { status, message } => Self::Server {
                status: Some(status),
                message,
            },
            RemoteError::Decode(message) | RemoteError::Client(message) => Self::Server {
                status: None,
                message,
            },
        }
    }
}
