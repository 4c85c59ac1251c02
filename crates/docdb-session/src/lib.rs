//! # DocDB Session
//!
//! Runs a fixed session against a MongoDB-compatible document database (AWS
//! DocumentDB in production): connect over TLS, verify liveness, ensure a unique
//! index, then insert, update and delete a single document.
//!
//! The crate is split along one seam. [`Connector`] and [`Backend`] describe the
//! handful of database calls the session needs; [`MongoConnector`] implements
//! them over the official `mongodb` driver and `MemoryConnector` (behind the
//! `testing` feature) implements them in-process for tests. [`SessionRunner`] sequences the calls, bounds the
//! connect phase with a deadline, emits [`SessionEvent`]s as it goes and
//! guarantees the connection is released on every exit path.
//!
//! ```no_run
//! use docdb_session::{MongoConnector, SessionConfig, SessionRunner, TransportSecurity};
//!
//! # async fn example() -> docdb_session::Result<()> {
//! let config = SessionConfig::from_env(TransportSecurity::Strict)?;
//! let runner = SessionRunner::new(MongoConnector, config);
//! let report = runner.run(&()).await?;
//! println!("deleted {}", report.deleted_count);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod events;
pub mod session;

pub use mongodb::bson;

#[cfg(any(test, feature = "testing"))]
pub use backend::memory::{MemoryConnector, MemoryFault, MemoryStore};
pub use backend::{
    mongo::{MongoBackend, MongoConnector},
    Backend,
    BackendError,
    Connector,
    UpdateCounts,
};
pub use config::{Namespace, SessionConfig, TransportSecurity};
pub use constants::*;
pub use document::{Contact, SessionPlan};
pub use error::{ErrorKind, Result, SessionError, WriteOperation};
pub use events::{EventEmitter, SessionEvent};
pub use session::{OperationOutcome, SessionReport, SessionRunner};
