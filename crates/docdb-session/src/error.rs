//! Errors reported by a session, one variant per step that can fail.

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::backend::BackendError;

/// The write step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    /// Inserting the sample document.
    Insert,
    /// Updating the sample document.
    Update,
    /// Deleting the sample document.
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match *self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
        };
        f.write_str(label)
    }
}

/// Error type for a session run.
///
/// Each variant corresponds to the step that failed. Every error is fatal to
/// the run: the runner stops at the first one and returns it, after releasing
/// the connection if one had been established.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// The client could not be built or the handshake was rejected.
    #[error("Connection error: {source}")]
    Connection {
        #[source]
        source: BackendError,
    },

    /// The connect deadline elapsed before the handshake completed.
    #[error("Connection error: timed out after {timeout:?}")]
    ConnectionTimeout {
        timeout: Duration,
    },

    /// The server was reached but did not answer the ping.
    #[error("Failed to ping database: {source}")]
    Liveness {
        #[source]
        source: BackendError,
    },

    /// The remaining connect deadline elapsed while waiting for the ping.
    #[error("Failed to ping database: timed out after {timeout:?}")]
    LivenessTimeout {
        timeout: Duration,
    },

    /// The server rejected creation of the unique index.
    #[error("Index creation failed on '{field}': {source}")]
    Index {
        field:  String,
        #[source]
        source: BackendError,
    },

    /// The server rejected an insert, update or delete.
    #[error("{operation} failed: {source}")]
    Write {
        operation: WriteOperation,
        #[source]
        source:    BackendError,
    },
}

/// Coarse classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Liveness,
    Index,
    Write,
}

impl SessionError {
    /// Returns the taxonomy bucket of this error.
    ///
    /// Timeouts fold into the step they interrupted.
    pub const fn kind(&self) -> ErrorKind {
        match *self {
            Self::Config {
                ..
            } => ErrorKind::Config,
            Self::Connection {
                ..
            }
            | Self::ConnectionTimeout {
                ..
            } => ErrorKind::Connection,
            Self::Liveness {
                ..
            }
            | Self::LivenessTimeout {
                ..
            } => ErrorKind::Liveness,
            Self::Index {
                ..
            } => ErrorKind::Index,
            Self::Write {
                ..
            } => ErrorKind::Write,
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
