//! Fixed parameters of the session.
//!
//! The session always targets the same namespace and works on the same sample
//! record; these names are collected here so the runner, the plan and the tests
//! agree on them.

use std::time::Duration;

/// Environment variable holding the connection string.
pub const CONNECTION_STRING_ENV: &str = "DOCDB_CONNECTION_STRING";

/// Database the session works in.
pub const DATABASE_NAME: &str = "mydb";

/// Collection the session works in.
pub const COLLECTION_NAME: &str = "mycollection";

/// Field carrying the unique ascending index.
pub const INDEXED_FIELD: &str = "email";

/// Email of the sample document; also the filter value for update and delete.
pub const SAMPLE_EMAIL: &str = "user@example.com";

/// Name of the sample document as inserted.
pub const SAMPLE_NAME: &str = "Alice";

/// Name written by the update step.
pub const UPDATED_NAME: &str = "Alice Smith";

/// Deadline shared by connection establishment and the liveness check.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
