//! Connection configuration and its resolution from the environment.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    constants::{COLLECTION_NAME, CONNECTION_STRING_ENV, DATABASE_NAME, DEFAULT_TIMEOUT},
    Result,
    SessionError,
};

/// Transport security applied to the connection.
///
/// There is intentionally no `Default`: whoever builds a [`SessionConfig`] has
/// to pick a mode, so skipping certificate verification is always a visible
/// choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportSecurity {
    /// Plain TCP, no TLS at all
    Disabled,
    /// TLS, but any server certificate is accepted
    Insecure,
    /// TLS with full certificate verification
    Strict,
}

impl TransportSecurity {
    /// Whether TLS is negotiated at all.
    pub const fn uses_tls(self) -> bool { !matches!(self, Self::Disabled) }

    /// Whether server certificates are accepted without verification.
    pub const fn skips_verification(self) -> bool { matches!(self, Self::Insecure) }
}

impl FromStr for TransportSecurity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "insecure" => Ok(Self::Insecure),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("Invalid transport security mode: {}", s)),
        }
    }
}

impl fmt::Display for TransportSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match *self {
            Self::Disabled => "disabled",
            Self::Insecure => "insecure",
            Self::Strict => "strict",
        };
        f.write_str(label)
    }
}

/// Database and collection the session operates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub database:   String,
    /// Collection name
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database:   database.into(),
            collection: collection.into(),
        }
    }
}

impl Default for Namespace {
    fn default() -> Self { Self::new(DATABASE_NAME, COLLECTION_NAME) }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}.{}", self.database, self.collection) }
}

/// Immutable configuration for one session run.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Connection string, possibly carrying credentials
    pub uri:       String,
    /// Transport security mode
    pub transport: TransportSecurity,
    /// Deadline shared by connect and liveness check
    pub timeout:   Duration,
    /// Target database and collection
    pub namespace: Namespace,
}

impl SessionConfig {
    /// Builds a configuration for `uri` with the default timeout and namespace.
    pub fn new(uri: impl Into<String>, transport: TransportSecurity) -> Self {
        Self {
            uri: uri.into(),
            transport,
            timeout: DEFAULT_TIMEOUT,
            namespace: Namespace::default(),
        }
    }

    /// Overrides the connect deadline.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the target namespace.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Resolves the configuration through an injected variable lookup.
    ///
    /// Fails with [`SessionError::Config`] when the connection string is unset,
    /// empty or whitespace only. No network access happens here.
    ///
    /// # Examples
    /// ```
    /// use docdb_session::{SessionConfig, TransportSecurity};
    ///
    /// let config = SessionConfig::from_lookup(
    ///     |_| Some("mongodb://localhost:27017".to_owned()),
    ///     TransportSecurity::Disabled,
    /// )
    /// .unwrap();
    /// assert_eq!(config.namespace.database, "mydb");
    /// ```
    pub fn from_lookup<F>(lookup: F, transport: TransportSecurity) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let uri = lookup(CONNECTION_STRING_ENV).unwrap_or_default();
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(SessionError::Config {
                message: format!("{} environment variable not set", CONNECTION_STRING_ENV),
            });
        }

        let config = Self::new(uri, transport);
        debug!(
            "Resolved configuration: endpoint {}, transport {}, timeout {:?}",
            config.redacted_uri(),
            config.transport,
            config.timeout
        );
        if transport.skips_verification() {
            warn!("TLS certificate verification is disabled; any server certificate will be accepted");
        }
        Ok(config)
    }

    /// Resolves the configuration from the process environment.
    pub fn from_env(transport: TransportSecurity) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), transport)
    }

    /// The connection string with any `user:password@` section masked.
    pub fn redacted_uri(&self) -> String {
        let Some((scheme, rest)) = self.uri.split_once("://")
        else {
            return self.uri.clone();
        };
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        match authority.rfind('@') {
            Some(at) => {
                let hosts = authority.get(at..).unwrap_or_default();
                format!("{}://***{}{}", scheme, hosts, tail)
            },
            None => self.uri.clone(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("uri", &self.redacted_uri())
            .field("transport", &self.transport)
            .field("timeout", &self.timeout)
            .field("namespace", &self.namespace)
            .finish()
    }
}
