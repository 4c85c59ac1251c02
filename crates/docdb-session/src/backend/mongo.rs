use async_trait::async_trait;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{ClientOptions, IndexOptions, Tls, TlsOptions},
    Client,
    Collection,
    IndexModel,
};
use tracing::{debug, trace};

use super::{Backend, BackendError, Connector, UpdateCounts};
use crate::{SessionConfig, TransportSecurity};

/// Application name reported to the server in the handshake metadata.
const APP_NAME: &str = "docdb-session";

/// Connects through the official `mongodb` driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl MongoConnector {
    /// Driver options for `config`.
    ///
    /// The transport mode decides whether TLS is on and whether certificates
    /// are verified. Other TLS settings from the connection string, such as
    /// `tlsCAFile` or `tlsCertificateKeyFile`, are kept. Connect and
    /// server-selection timeouts are set to the session timeout so no later
    /// operation waits indefinitely for a server.
    pub async fn client_options(config: &SessionConfig) -> Result<ClientOptions, BackendError> {
        let mut options = ClientOptions::parse(config.uri.as_str()).await?;
        options.tls = Some(tls_for(config.transport, options.tls.take()));
        options.connect_timeout = Some(config.timeout);
        options.server_selection_timeout = Some(config.timeout);
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        trace!("Client options resolved for hosts {:?}", options.hosts);
        Ok(options)
    }
}

/// Driver TLS settings for a transport mode, on top of those parsed from the URI.
fn tls_for(transport: TransportSecurity, parsed: Option<Tls>) -> Tls {
    if transport == TransportSecurity::Disabled {
        return Tls::Disabled;
    }
    let mut tls = match parsed {
        Some(Tls::Enabled(tls)) => tls,
        _ => TlsOptions::builder().build(),
    };
    // `tlsInsecure` in the URI must not weaken strict mode.
    tls.allow_invalid_certificates = (transport == TransportSecurity::Insecure).then_some(true);
    Tls::Enabled(tls)
}

#[async_trait]
impl Connector for MongoConnector {
    type Backend = MongoBackend;

    async fn connect(&self, config: &SessionConfig) -> Result<MongoBackend, BackendError> {
        let options = Self::client_options(config).await?;
        let client = Client::with_options(options)?;
        let collection = client
            .database(&config.namespace.database)
            .collection::<Document>(&config.namespace.collection);
        debug!("Client built for namespace {}", config.namespace);
        Ok(MongoBackend {
            client,
            collection,
        })
    }
}

/// A driver client plus the handle of the target collection.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    /// Driver client; cloning shares the same connection pool.
    client:     Client,
    /// Target collection.
    collection: Collection<Document>,
}

impl MongoBackend {
    /// Runs `command` against the `admin` database.
    async fn admin_command(&self, command: Document) -> Result<Document, BackendError> {
        Ok(self.client.database("admin").run_command(command).await?)
    }
}

#[async_trait]
impl Backend for MongoBackend {
    async fn handshake(&self) -> Result<(), BackendError> {
        // `isMaster` rather than `hello`: older DocumentDB engines only know the legacy name.
        let reply = self.admin_command(doc! { "isMaster": 1 }).await?;
        trace!("Handshake reply: {}", reply);
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.admin_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn create_unique_index(&self, field: &str) -> Result<String, BackendError> {
        let mut keys = Document::new();
        keys.insert(field, 1_i32);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let result = self.collection.create_index(index).await?;
        Ok(result.index_name)
    }

    async fn insert_one(&self, document: Document) -> Result<Bson, BackendError> {
        let result = self.collection.insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateCounts, BackendError> {
        let result = self.collection.update_one(filter, update).await?;
        Ok(UpdateCounts {
            matched:  result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError> {
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn shutdown(&self) { self.client.clone().shutdown().await; }
}
