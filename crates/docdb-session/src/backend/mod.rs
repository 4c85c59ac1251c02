//! The database calls a session needs, behind a trait seam.

/// In-process backend with fault injection.
#[cfg(any(test, feature = "testing"))]
pub mod memory;
/// Backend over the official MongoDB driver.
pub mod mongo;

use mongodb::bson::{Bson, Document};
use thiserror::Error;

use crate::SessionConfig;

/// Failure reported by a backend, before the runner attributes it to a step.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The MongoDB driver returned an error
    #[error("{source}")]
    Driver {
        #[from]
        source: mongodb::error::Error,
    },

    /// A document could not be serialized to BSON
    #[error("BSON serialization error: {source}")]
    Serialization {
        #[from]
        source: mongodb::bson::ser::Error,
    },

    /// The endpoint could not be reached or refused the handshake
    #[error("server unreachable: {reason}")]
    Unreachable {
        reason: String,
    },

    /// A write would violate a unique index
    #[error("E11000 duplicate key error collection: {namespace} index: {index} dup key: {key}")]
    DuplicateKey {
        namespace: String,
        index:     String,
        key:       String,
    },

    /// An index with the same key but different options already exists
    #[error("Index with name: {name} already exists with different options")]
    IndexOptionsConflict {
        name: String,
    },

    /// A filter or update uses an operator the backend cannot apply
    #[error("unsupported operator '{operator}'")]
    UnsupportedOperator {
        operator: String,
    },
}

/// Outcome of an update as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateCounts {
    /// Documents matching the filter
    pub matched:  u64,
    /// Documents actually changed
    pub modified: u64,
}

/// Builds connections for a session.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Backend: Backend;

    /// Build a client for `config`.
    ///
    /// This only prepares the client; the network handshake is
    /// [`Backend::handshake`]. The runner bounds both with the config timeout.
    async fn connect(&self, config: &SessionConfig) -> Result<Self::Backend, BackendError>;
}

/// An established connection scoped to one namespace.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Complete the server handshake.
    async fn handshake(&self) -> Result<(), BackendError>;

    /// Lightweight round-trip to confirm the server answers.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Create a unique ascending index on `field`, returning the index name.
    ///
    /// Must succeed without change when an identical index already exists.
    async fn create_unique_index(&self, field: &str) -> Result<String, BackendError>;

    /// Insert `document`, returning its identifier.
    async fn insert_one(&self, document: Document) -> Result<Bson, BackendError>;

    /// Apply `update` to the first document matching `filter`.
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateCounts, BackendError>;

    /// Delete the first document matching `filter`, returning the deleted count.
    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError>;

    /// Release the connection.
    async fn shutdown(&self);
}
