//! The sample record and the data of the fixed sequence.

use mongodb::bson::{self, doc, Document};
use serde::{Deserialize, Serialize};

use crate::{
    backend::BackendError,
    constants::{INDEXED_FIELD, SAMPLE_EMAIL, SAMPLE_NAME, UPDATED_NAME},
};

/// The record the session inserts, updates and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact email, unique across the collection
    pub email: String,
    /// Display name
    pub name:  String,
}

impl Contact {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name:  name.into(),
        }
    }

    /// Serializes the contact into a BSON document, field order preserved.
    pub fn to_document(&self) -> Result<Document, BackendError> { Ok(bson::to_document(self)?) }
}

/// What the session writes: the index field, the document and the
/// filter/update pair used by the update and delete steps.
///
/// `SessionPlan::default()` is the fixed production sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    /// Field that receives the unique ascending index
    pub index_field: String,
    /// Document inserted by the insert step
    pub document:    Contact,
    /// Filter shared by the update and delete steps
    pub filter:      Document,
    /// Update modifications applied by the update step
    pub update:      Document,
}

impl SessionPlan {
    /// Plan for `contact`: filter on its email, rename it to `new_name`.
    pub fn for_contact(contact: Contact, new_name: &str) -> Self {
        let mut filter = Document::new();
        filter.insert(INDEXED_FIELD, contact.email.as_str());
        Self {
            index_field: INDEXED_FIELD.to_owned(),
            document: contact,
            filter,
            update: doc! { "$set": { "name": new_name } },
        }
    }

    /// Replaces the filter used by the update and delete steps.
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for SessionPlan {
    fn default() -> Self { Self::for_contact(Contact::new(SAMPLE_EMAIL, SAMPLE_NAME), UPDATED_NAME) }
}
