use mongodb::bson::Bson;

use crate::Namespace;

/// Result of a single data operation, consumed right after it is reported.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// Identifier of the inserted document
    Inserted(Bson),
    /// Documents matched and modified by the update
    Updated {
        matched:  u64,
        modified: u64,
    },
    /// Documents removed by the delete
    Deleted(u64),
}

/// Summary of a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Namespace the session ran against
    pub namespace:      Namespace,
    /// Name of the unique index
    pub index_name:     String,
    /// Identifier produced by the insert
    pub inserted_id:    Option<Bson>,
    /// Documents matched by the update filter
    pub matched_count:  u64,
    /// Documents changed by the update
    pub modified_count: u64,
    /// Documents removed by the delete
    pub deleted_count:  u64,
}

impl SessionReport {
    pub fn new(namespace: Namespace, index_name: String) -> Self {
        Self {
            namespace,
            index_name,
            inserted_id: None,
            matched_count: 0,
            modified_count: 0,
            deleted_count: 0,
        }
    }

    /// Folds one operation outcome into the summary.
    pub fn record(&mut self, outcome: OperationOutcome) {
        match outcome {
            OperationOutcome::Inserted(id) => self.inserted_id = Some(id),
            OperationOutcome::Updated {
                matched,
                modified,
            } => {
                self.matched_count = matched;
                self.modified_count = modified;
            },
            OperationOutcome::Deleted(deleted) => self.deleted_count = deleted,
        }
    }
}
