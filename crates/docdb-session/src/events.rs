//! Progress events emitted by the session runner.
//!
//! The runner reports every step through an [`EventEmitter`] so that callers
//! decide how progress is rendered. The CLI prints console lines; tests collect
//! events through a channel and assert on the exact sequence.

use mongodb::bson::Bson;
use tokio::sync::mpsc;

/// Events emitted while a session runs, in the order the steps execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Connection establishment started.
    Connecting {
        /// Endpoint with credentials masked.
        endpoint: String,
    },
    /// Handshake and liveness check both succeeded.
    Connected,
    /// Unique index creation started.
    CreatingIndex {
        /// Indexed field.
        field: String,
    },
    /// The unique index exists.
    IndexCreated {
        /// Indexed field.
        field: String,
        /// Index name reported by the server.
        name:  String,
    },
    /// Insert started.
    Inserting,
    /// The document was inserted.
    Inserted {
        /// Identifier of the inserted document.
        id: Bson,
    },
    /// Update started.
    Updating,
    /// The update finished.
    Updated {
        /// Documents matching the filter.
        matched:  u64,
        /// Documents actually changed.
        modified: u64,
    },
    /// Delete started.
    Deleting,
    /// The delete finished.
    Deleted {
        /// Documents removed.
        deleted: u64,
    },
    /// The connection has been released.
    Released,
    /// Every step succeeded.
    Completed,
}

/// Trait for sinks that receive session events.
pub trait EventEmitter {
    /// Deliver one event.
    fn emit_event(&self, event: SessionEvent);
}

/// Discards every event.
impl EventEmitter for () {
    fn emit_event(&self, _event: SessionEvent) {}
}

impl EventEmitter for mpsc::UnboundedSender<SessionEvent> {
    fn emit_event(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event);
    }
}
