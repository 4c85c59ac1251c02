use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{OperationOutcome, SessionReport};
use crate::{
    backend::{Backend, Connector},
    document::SessionPlan,
    error::WriteOperation,
    events::{EventEmitter, SessionEvent},
    Result,
    SessionConfig,
    SessionError,
};

/// Roughly 30 years, used when a timeout does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(946_080_000);

/// The instant `timeout` from now, saturating at a far-future deadline.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Runs the fixed session: connect, verify, ensure index, insert, update, delete.
///
/// The runner owns the configuration and the plan; each call to
/// [`SessionRunner::run`] opens its own connection and releases it before
/// returning, whatever the outcome.
///
/// # Examples
///
/// ```no_run
/// use docdb_session::{MongoConnector, SessionConfig, SessionRunner, TransportSecurity};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> docdb_session::Result<()> {
/// let config = SessionConfig::new("mongodb://localhost:27017", TransportSecurity::Disabled);
/// let runner = SessionRunner::new(MongoConnector, config);
/// let report = runner.run(&()).await?;
/// assert_eq!(report.modified_count, 1);
/// assert_eq!(report.deleted_count, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionRunner<C> {
    /// Source of connections.
    connector: C,
    /// Resolved configuration.
    config:    SessionConfig,
    /// Data written by the session.
    plan:      SessionPlan,
}

impl<C: Connector> SessionRunner<C> {
    /// Creates a runner executing the default plan.
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            plan: SessionPlan::default(),
        }
    }

    /// Replaces the plan.
    pub fn with_plan(mut self, plan: SessionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub const fn config(&self) -> &SessionConfig { &self.config }

    pub const fn connector(&self) -> &C { &self.connector }

    /// Executes the session, stopping at the first failing step.
    ///
    /// Building the client, the handshake and the liveness ping share a single
    /// deadline of `config.timeout`. Once a connection exists it is shut down
    /// exactly once before this returns, on success and on every error.
    /// Nothing is rolled back: a failed update leaves the inserted document.
    ///
    /// # Errors
    /// Returns the [`SessionError`] of the step that failed.
    pub async fn run<E>(&self, events: &E) -> Result<SessionReport>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        let endpoint = self.config.redacted_uri();
        info!("Connecting to {} (transport {})", endpoint, self.config.transport);
        events.emit_event(SessionEvent::Connecting {
            endpoint,
        });

        let deadline = deadline_after(self.config.timeout);
        let backend = timeout_at(deadline, self.connector.connect(&self.config))
            .await
            .map_err(|_| {
                SessionError::ConnectionTimeout {
                    timeout: self.config.timeout,
                }
            })?
            .map_err(|source| {
                SessionError::Connection {
                    source,
                }
            })?;

        let outcome = self.drive(&backend, deadline, events).await;

        backend.shutdown().await;
        debug!("Connection released");
        events.emit_event(SessionEvent::Released);

        let report = outcome?;
        info!("Session against {} completed", report.namespace);
        events.emit_event(SessionEvent::Completed);
        Ok(report)
    }

    /// Every step after the client exists, in order.
    async fn drive<E>(&self, backend: &C::Backend, deadline: Instant, events: &E) -> Result<SessionReport>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        self.verify(backend, deadline).await?;
        events.emit_event(SessionEvent::Connected);

        let index_name = self.ensure_index(backend, events).await?;
        let mut report = SessionReport::new(self.config.namespace.clone(), index_name);

        report.record(self.insert(backend, events).await?);
        report.record(self.update(backend, events).await?);
        report.record(self.delete(backend, events).await?);
        Ok(report)
    }

    /// Handshake, then ping, both bounded by `deadline`.
    async fn verify(&self, backend: &C::Backend, deadline: Instant) -> Result<()> {
        let timeout = self.config.timeout;

        timeout_at(deadline, backend.handshake())
            .await
            .map_err(|_| {
                SessionError::ConnectionTimeout {
                    timeout,
                }
            })?
            .map_err(|source| {
                SessionError::Connection {
                    source,
                }
            })?;
        debug!("Handshake completed");

        timeout_at(deadline, backend.ping())
            .await
            .map_err(|_| {
                SessionError::LivenessTimeout {
                    timeout,
                }
            })?
            .map_err(|source| {
                SessionError::Liveness {
                    source,
                }
            })?;
        info!("Server at {} is live", self.config.redacted_uri());
        Ok(())
    }

    async fn ensure_index<E>(&self, backend: &C::Backend, events: &E) -> Result<String>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        let field = self.plan.index_field.clone();
        info!("Creating unique index on '{}' in {}", field, self.config.namespace);
        events.emit_event(SessionEvent::CreatingIndex {
            field: field.clone(),
        });

        let name = match backend.create_unique_index(&field).await {
            Ok(name) => name,
            Err(source) => {
                return Err(SessionError::Index {
                    field,
                    source,
                })
            },
        };

        debug!("Index '{}' present on '{}'", name, field);
        events.emit_event(SessionEvent::IndexCreated {
            field,
            name: name.clone(),
        });
        Ok(name)
    }

    async fn insert<E>(&self, backend: &C::Backend, events: &E) -> Result<OperationOutcome>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        info!("Inserting document into {}", self.config.namespace);
        events.emit_event(SessionEvent::Inserting);

        let id = async { backend.insert_one(self.plan.document.to_document()?).await }
            .await
            .map_err(|source| {
                SessionError::Write {
                    operation: WriteOperation::Insert,
                    source,
                }
            })?;

        info!("Inserted document with id {}", id);
        events.emit_event(SessionEvent::Inserted {
            id: id.clone(),
        });
        Ok(OperationOutcome::Inserted(id))
    }

    async fn update<E>(&self, backend: &C::Backend, events: &E) -> Result<OperationOutcome>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        info!("Updating documents matching {}", self.plan.filter);
        events.emit_event(SessionEvent::Updating);

        let counts = backend
            .update_one(self.plan.filter.clone(), self.plan.update.clone())
            .await
            .map_err(|source| {
                SessionError::Write {
                    operation: WriteOperation::Update,
                    source,
                }
            })?;

        if counts.matched == 0 {
            warn!("Update filter {} matched no document", self.plan.filter);
        }
        info!("Update matched {} and modified {}", counts.matched, counts.modified);
        events.emit_event(SessionEvent::Updated {
            matched:  counts.matched,
            modified: counts.modified,
        });
        Ok(OperationOutcome::Updated {
            matched:  counts.matched,
            modified: counts.modified,
        })
    }

    async fn delete<E>(&self, backend: &C::Backend, events: &E) -> Result<OperationOutcome>
    where
        E: EventEmitter + Sync + ?Sized,
    {
        info!("Deleting documents matching {}", self.plan.filter);
        events.emit_event(SessionEvent::Deleting);

        let deleted = backend
            .delete_one(self.plan.filter.clone())
            .await
            .map_err(|source| {
                SessionError::Write {
                    operation: WriteOperation::Delete,
                    source,
                }
            })?;

        if deleted == 0 {
            warn!("Delete filter {} matched no document", self.plan.filter);
        }
        info!("Deleted {} document(s)", deleted);
        events.emit_event(SessionEvent::Deleted {
            deleted,
        });
        Ok(OperationOutcome::Deleted(deleted))
    }
}
