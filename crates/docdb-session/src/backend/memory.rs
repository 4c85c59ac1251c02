use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::{Backend, BackendError, Connector, UpdateCounts};
use crate::{Namespace, SessionConfig};

/// Name of the implicit index on `_id`.
const ID_INDEX: &str = "_id_";

/// Failure injected into a [`MemoryConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryFault {
    /// Behave like a healthy server
    #[default]
    None,
    /// Reject the handshake immediately
    RefuseHandshake,
    /// Never answer the handshake
    HangHandshake,
    /// Reject the ping immediately
    RefusePing,
    /// Never answer the ping
    HangPing,
}

/// An index definition held by a memory collection.
#[derive(Debug, Clone)]
struct IndexSpec {
    /// Index name, `<field>_1` like the server derives it.
    name:   String,
    /// Indexed field.
    field:  String,
    /// Whether duplicate values are rejected.
    unique: bool,
}

/// Documents and indexes of one namespace.
#[derive(Debug, Default)]
struct MemoryCollection {
    /// Documents in insertion order.
    documents: Vec<Document>,
    /// Secondary indexes; `_id` uniqueness is implicit.
    indexes:   Vec<IndexSpec>,
}

impl MemoryCollection {
    /// Finds a document whose `field` equals the one in `candidate`, skipping `skip`.
    fn conflict(&self, field: &str, candidate: &Document, skip: Option<usize>) -> Option<Bson> {
        let value = candidate.get(field).cloned().unwrap_or(Bson::Null);
        let duplicate = self
            .documents
            .iter()
            .enumerate()
            .filter(|&(position, _)| Some(position) != skip)
            .any(|(_, existing)| existing.get(field).unwrap_or(&Bson::Null) == &value);
        duplicate.then_some(value)
    }

    /// Checks `candidate` against `_id` and every unique index.
    fn check_unique(&self, namespace: &Namespace, candidate: &Document, skip: Option<usize>) -> Result<(), BackendError> {
        let unique_fields = std::iter::once((ID_INDEX, "_id")).chain(
            self.indexes
                .iter()
                .filter(|index| index.unique)
                .map(|index| (index.name.as_str(), index.field.as_str())),
        );
        for (index, field) in unique_fields {
            if let Some(value) = self.conflict(field, candidate, skip) {
                return Err(BackendError::DuplicateKey {
                    namespace: namespace.to_string(),
                    index:     index.to_owned(),
                    key:       format!("{{ {}: {} }}", field, value),
                });
            }
        }
        Ok(())
    }

    /// Position of the first document matching `filter`.
    fn position(&self, filter: &Document) -> Result<Option<usize>, BackendError> {
        if let Some(operator) = filter.keys().find(|key| key.starts_with('$')) {
            return Err(BackendError::UnsupportedOperator {
                operator: operator.clone(),
            });
        }
        Ok(self.documents.iter().position(|document| {
            filter
                .iter()
                .all(|(key, expected)| document.get(key) == Some(expected))
        }))
    }
}

/// Database contents shared by every connection made from the same store.
///
/// Cloning is cheap and yields a handle to the same data, so two sessions run
/// against one store observe each other's indexes and documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Collections keyed by namespace.
    collections: Arc<Mutex<HashMap<Namespace, MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Defines an index on `field` as if it had been created earlier.
    pub async fn seed_index(&self, namespace: &Namespace, field: &str, unique: bool) {
        let mut collections = self.collections.lock().await;
        collections
            .entry(namespace.clone())
            .or_default()
            .indexes
            .push(IndexSpec {
                name: index_name(field),
                field: field.to_owned(),
                unique,
            });
    }

    /// Stores `document` without any index checks.
    pub async fn seed_document(&self, namespace: &Namespace, document: Document) {
        let mut collections = self.collections.lock().await;
        collections
            .entry(namespace.clone())
            .or_default()
            .documents
            .push(document);
    }

    /// Snapshot of the documents in `namespace`.
    pub async fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        let collections = self.collections.lock().await;
        collections
            .get(namespace)
            .map(|collection| collection.documents.clone())
            .unwrap_or_default()
    }

    /// Names of the secondary indexes in `namespace`.
    pub async fn index_names(&self, namespace: &Namespace) -> Vec<String> {
        let collections = self.collections.lock().await;
        collections
            .get(namespace)
            .map(|collection| {
                collection
                    .indexes
                    .iter()
                    .map(|index| index.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Server-style name of an ascending single-field index.
fn index_name(field: &str) -> String { format!("{}_1", field) }

/// Connector for an in-process [`MemoryStore`].
///
/// It counts connection attempts and connection releases so callers can
/// verify when the network would have been touched.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    /// Shared data.
    store:            MemoryStore,
    /// Injected failure.
    fault:            MemoryFault,
    /// Number of `connect` calls.
    connect_attempts: Arc<AtomicUsize>,
    /// Number of `shutdown` calls across all backends.
    shutdowns:        Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Makes every connection from this connector fail in the given way.
    pub fn with_fault(mut self, fault: MemoryFault) -> Self {
        self.fault = fault;
        self
    }

    /// The store backing this connector.
    pub const fn store(&self) -> &MemoryStore { &self.store }

    /// How many times `connect` ran.
    pub fn connect_attempts(&self) -> usize { self.connect_attempts.load(Ordering::SeqCst) }

    /// How many times a backend from this connector was shut down.
    pub fn shutdowns(&self) -> usize { self.shutdowns.load(Ordering::SeqCst) }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Backend = MemoryBackend;

    async fn connect(&self, config: &SessionConfig) -> Result<MemoryBackend, BackendError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        debug!("Opening memory connection for {}", config.namespace);
        Ok(MemoryBackend {
            store:     self.store.clone(),
            namespace: config.namespace.clone(),
            fault:     self.fault,
            shutdowns: self.shutdowns.clone(),
        })
    }
}

/// A connection to a [`MemoryStore`], scoped to one namespace.
#[derive(Debug)]
pub struct MemoryBackend {
    /// Shared data.
    store:     MemoryStore,
    /// Target namespace.
    namespace: Namespace,
    /// Injected failure.
    fault:     MemoryFault,
    /// Shutdown counter shared with the connector.
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn handshake(&self) -> Result<(), BackendError> {
        match self.fault {
            MemoryFault::RefuseHandshake => {
                Err(BackendError::Unreachable {
                    reason: "connection refused".to_owned(),
                })
            },
            MemoryFault::HangHandshake => std::future::pending().await,
            MemoryFault::None | MemoryFault::RefusePing | MemoryFault::HangPing => Ok(()),
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        match self.fault {
            MemoryFault::RefusePing => {
                Err(BackendError::Unreachable {
                    reason: "ping rejected".to_owned(),
                })
            },
            MemoryFault::HangPing => std::future::pending().await,
            MemoryFault::None | MemoryFault::RefuseHandshake | MemoryFault::HangHandshake => Ok(()),
        }
    }

    async fn create_unique_index(&self, field: &str) -> Result<String, BackendError> {
        let mut collections = self.store.collections.lock().await;
        let collection = collections.entry(self.namespace.clone()).or_default();
        let name = index_name(field);

        if let Some(existing) = collection.indexes.iter().find(|index| index.field == field) {
            if existing.unique {
                trace!("Index {} already present on {}", existing.name, self.namespace);
                return Ok(existing.name.clone());
            }
            return Err(BackendError::IndexOptionsConflict {
                name: existing.name.clone(),
            });
        }

        for (position, document) in collection.documents.iter().enumerate() {
            if let Some(value) = collection.conflict(field, document, Some(position)) {
                return Err(BackendError::DuplicateKey {
                    namespace: self.namespace.to_string(),
                    index:     name,
                    key:       format!("{{ {}: {} }}", field, value),
                });
            }
        }

        collection.indexes.push(IndexSpec {
            name: name.clone(),
            field: field.to_owned(),
            unique: true,
        });
        Ok(name)
    }

    async fn insert_one(&self, mut document: Document) -> Result<Bson, BackendError> {
        if !document.contains_key("_id") {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            for (key, value) in document {
                with_id.insert(key, value);
            }
            document = with_id;
        }
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        let mut collections = self.store.collections.lock().await;
        let collection = collections.entry(self.namespace.clone()).or_default();
        collection.check_unique(&self.namespace, &document, None)?;
        collection.documents.push(document);
        Ok(id)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateCounts, BackendError> {
        let mut set = Document::new();
        for (operator, fields) in update {
            let Bson::Document(fields) = fields
            else {
                return Err(BackendError::UnsupportedOperator {
                    operator,
                });
            };
            if operator != "$set" {
                return Err(BackendError::UnsupportedOperator {
                    operator,
                });
            }
            for (key, value) in fields {
                set.insert(key, value);
            }
        }

        let mut collections = self.store.collections.lock().await;
        let collection = collections.entry(self.namespace.clone()).or_default();
        let Some(position) = collection.position(&filter)?
        else {
            return Ok(UpdateCounts::default());
        };
        let Some(current) = collection.documents.get(position)
        else {
            return Ok(UpdateCounts::default());
        };

        let mut updated = current.clone();
        for (key, value) in set {
            updated.insert(key, value);
        }
        if updated == *current {
            return Ok(UpdateCounts {
                matched:  1,
                modified: 0,
            });
        }

        collection.check_unique(&self.namespace, &updated, Some(position))?;
        if let Some(slot) = collection.documents.get_mut(position) {
            *slot = updated;
        }
        Ok(UpdateCounts {
            matched:  1,
            modified: 1,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError> {
        let mut collections = self.store.collections.lock().await;
        let collection = collections.entry(self.namespace.clone()).or_default();
        match collection.position(&filter)? {
            Some(position) => {
                collection.documents.remove(position);
                Ok(1)
            },
            None => Ok(0),
        }
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        debug!("Memory connection for {} released", self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;
    use crate::TransportSecurity;

    async fn connect(connector: &MemoryConnector) -> MemoryBackend {
        let config = SessionConfig::new("mongodb://memory", TransportSecurity::Disabled);
        connector.connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_insert() {
        let connector = MemoryConnector::default();
        let backend = connect(&connector).await;

        assert_eq!(backend.create_unique_index("email").await.unwrap(), "email_1");
        backend
            .insert_one(doc! { "email": "user@example.com", "name": "Alice" })
            .await
            .unwrap();
        let err = backend
            .insert_one(doc! { "email": "user@example.com", "name": "Bob" })
            .await
            .unwrap_err();
        match err {
            BackendError::DuplicateKey {
                index,
                key,
                ..
            } => {
                assert_eq!(index, "email_1");
                assert_eq!(key, r#"{ email: "user@example.com" }"#);
            },
            other => panic!("Expected duplicate key, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_index_creation_is_idempotent() {
        let connector = MemoryConnector::default();
        let backend = connect(&connector).await;
        backend.create_unique_index("email").await.unwrap();
        backend.create_unique_index("email").await.unwrap();
        assert_eq!(
            connector.store().index_names(&Namespace::default()).await,
            ["email_1"]
        );
    }

    #[tokio::test]
    async fn test_non_unique_index_conflicts() {
        let store = MemoryStore::new();
        store.seed_index(&Namespace::default(), "email", false).await;
        let backend = connect(&MemoryConnector::new(store)).await;
        assert!(matches!(
            backend.create_unique_index("email").await,
            Err(BackendError::IndexOptionsConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_unique_index_fails_over_existing_duplicates() {
        let store = MemoryStore::new();
        let namespace = Namespace::default();
        store.seed_document(&namespace, doc! { "_id": 1, "email": "a@example.com" }).await;
        store.seed_document(&namespace, doc! { "_id": 2, "email": "a@example.com" }).await;
        let backend = connect(&MemoryConnector::new(store)).await;
        assert!(matches!(
            backend.create_unique_index("email").await,
            Err(BackendError::DuplicateKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_generates_leading_object_id() {
        let connector = MemoryConnector::default();
        let backend = connect(&connector).await;
        let id = backend.insert_one(doc! { "email": "user@example.com" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let documents = connector.store().documents(&Namespace::default()).await;
        let first_key = documents.first().and_then(|document| document.keys().next().cloned());
        assert_eq!(first_key.as_deref(), Some("_id"));
    }

    #[tokio::test]
    async fn test_update_counts() {
        let backend = connect(&MemoryConnector::default()).await;
        backend
            .insert_one(doc! { "email": "user@example.com", "name": "Alice" })
            .await
            .unwrap();

        let filter = doc! { "email": "user@example.com" };
        let rename = doc! { "$set": { "name": "Alice Smith" } };
        let counts = backend.update_one(filter.clone(), rename.clone()).await.unwrap();
        assert_eq!(counts, UpdateCounts { matched: 1, modified: 1 });

        // Same value again: matched but unchanged.
        let counts = backend.update_one(filter, rename.clone()).await.unwrap();
        assert_eq!(counts, UpdateCounts { matched: 1, modified: 0 });

        let counts = backend
            .update_one(doc! { "email": "nobody@example.com" }, rename)
            .await
            .unwrap();
        assert_eq!(counts, UpdateCounts::default());
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_operator() {
        let backend = connect(&MemoryConnector::default()).await;
        let result = backend
            .update_one(doc! { "email": "user@example.com" }, doc! { "$inc": { "visits": 1 } })
            .await;
        assert!(matches!(
            result,
            Err(BackendError::UnsupportedOperator { ref operator }) if operator == "$inc"
        ));
    }

    #[tokio::test]
    async fn test_update_cannot_break_unique_index() {
        let backend = connect(&MemoryConnector::default()).await;
        backend.create_unique_index("email").await.unwrap();
        backend.insert_one(doc! { "email": "a@example.com" }).await.unwrap();
        backend.insert_one(doc! { "email": "b@example.com" }).await.unwrap();
        let result = backend
            .update_one(doc! { "email": "b@example.com" }, doc! { "$set": { "email": "a@example.com" } })
            .await;
        assert!(matches!(result, Err(BackendError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn test_second_delete_reports_zero() {
        let backend = connect(&MemoryConnector::default()).await;
        backend.insert_one(doc! { "email": "user@example.com" }).await.unwrap();
        let filter = doc! { "email": "user@example.com" };
        assert_eq!(backend.delete_one(filter.clone()).await.unwrap(), 1);
        assert_eq!(backend.delete_one(filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_faults_and_counters() {
        let connector = MemoryConnector::default().with_fault(MemoryFault::RefusePing);
        let backend = connect(&connector).await;
        assert!(backend.handshake().await.is_ok());
        assert!(matches!(backend.ping().await, Err(BackendError::Unreachable { .. })));
        backend.shutdown().await;
        assert_eq!(connector.connect_attempts(), 1);
        assert_eq!(connector.shutdowns(), 1);
    }
}
