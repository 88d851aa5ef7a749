//! Document adapter over a `MongoDB` collection.
//!
//! The driver is async; the adapter owns a Tokio runtime and blocks on it,
//! so it must not be called from inside another Tokio runtime. Every call is
//! bounded by the configured timeout and fails with [`Error::Timeout`] when
//! it elapses. Nothing is retried.
//!
//! `update`, `update_by_id`, `remove_by_id` and `find_by_ids` are not
//! implemented by this backend and return [`Error::NotSupported`].

mod convert;

pub use convert::{
    ENGINE_ID, bson_to_value, build_filter, build_find_options, document_to_record, id_to_bson,
    record_to_document,
};

use crate::models::{QueryDescriptor, Record, query};
use crate::storage::metrics::timed;
use crate::storage::state::ConnectionSlot;
use crate::storage::traits::{Adapter, parse_descriptor};
use crate::{Error, Result};
use mongodb::bson::{Document, doc};
use mongodb::{Client, Collection};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::instrument;

const BACKEND: &str = "mongodb";

const fn default_timeout_ms() -> u64 {
    10_000
}

/// Configuration for [`DocumentAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DocumentConfig {
    /// Creates a configuration with the default 10 second timeout.
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A live connection: the runtime driving the client, and the collection.
struct Session {
    runtime: Runtime,
    client: Client,
    collection: Collection<Document>,
}

/// Adapter over one `MongoDB` collection.
pub struct DocumentAdapter {
    config: DocumentConfig,
    session: ConnectionSlot<Session>,
}

impl DocumentAdapter {
    /// Creates an adapter. Nothing is opened until [`Adapter::connect`].
    #[must_use]
    pub const fn new(config: DocumentConfig) -> Self {
        Self {
            config,
            session: ConnectionSlot::new(BACKEND),
        }
    }

    /// Collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    const fn not_supported(operation: &'static str) -> Error {
        Error::NotSupported {
            backend: BACKEND,
            operation,
        }
    }

    /// Runs a driver call on the session runtime under the per-call timeout.
    fn run<T, F>(&self, session: &Session, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let timeout = self.config.timeout();
        match session
            .runtime
            .block_on(async { tokio::time::timeout(timeout, call).await })
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(
                    collection = %self.config.collection,
                    operation,
                    error = %e,
                    "MongoDB call failed"
                );
                Err(Error::OperationFailed {
                    operation: operation.to_string(),
                    target: self.config.collection.clone(),
                    cause: e.to_string(),
                })
            },
            Err(_) => {
                tracing::warn!(operation, ?timeout, "MongoDB call timed out");
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    timeout,
                })
            },
        }
    }

    fn open_session(&self) -> Result<Session> {
        let connection_error = |cause: String| Error::ConnectionFailed {
            backend: BACKEND,
            cause,
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("omnistore-mongodb")
            .build()
            .map_err(|e| connection_error(format!("cannot start runtime: {e}")))?;

        let timeout = self.config.timeout();
        let connected = runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                let client = Client::with_uri_str(&self.config.uri).await?;
                client
                    .database(&self.config.database)
                    .run_command(doc! {"ping": 1})
                    .await?;
                Ok::<_, mongodb::error::Error>(client)
            })
            .await
        });
        let client = match connected {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => return Err(connection_error(e.to_string())),
            Err(_) => return Err(connection_error(format!("timed out after {timeout:?}"))),
        };

        let collection = client
            .database(&self.config.database)
            .collection::<Document>(&self.config.collection);
        Ok(Session {
            runtime,
            client,
            collection,
        })
    }

    fn find_documents(&self, descriptor: &QueryDescriptor) -> Result<Vec<Record>> {
        let filter = build_filter(descriptor)?;
        let options = build_find_options(descriptor);
        tracing::debug!(filter = %filter, "find");
        let session = self.session.get()?;
        let collection = &session.collection;
        self.run(&session, "find", async move {
            let mut cursor = collection.find(filter).with_options(options).await?;
            let mut records = Vec::new();
            while cursor.advance().await? {
                records.push(document_to_record(cursor.deserialize_current()?));
            }
            Ok(records)
        })
    }
}

impl Adapter for DocumentAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "connect", backend = BACKEND, collection = %self.config.collection))]
    fn connect(&self) -> Result<()> {
        if self.session.is_set() {
            tracing::debug!("already connected");
            return Ok(());
        }
        let session = self.open_session().inspect_err(|e| {
            tracing::error!(error = %e, "could not connect to MongoDB");
        })?;
        self.session.install(session);
        Ok(())
    }

    #[instrument(skip(self), fields(operation = "disconnect", backend = BACKEND, collection = %self.config.collection))]
    fn disconnect(&self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::NotConnected { backend: BACKEND })?;
        let client = session.client.clone();
        self.run(&session, "disconnect", async move {
            client.shutdown().await;
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.session.is_set()
    }

    #[instrument(skip(self, params), fields(operation = "find", backend = BACKEND, collection = %self.config.collection))]
    fn find(&self, params: &Record) -> Result<Vec<Record>> {
        timed(BACKEND, "find", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            self.find_documents(&descriptor)
        })
    }

    #[instrument(skip(self), fields(operation = "find_by_id", backend = BACKEND, collection = %self.config.collection))]
    fn find_by_id(&self, id: &Value) -> Result<Option<Record>> {
        timed(BACKEND, "find_by_id", || {
            let descriptor = QueryDescriptor::new()
                .with_query(query::ID, id.clone())
                .with_limit(1);
            Ok(self.find_documents(&descriptor)?.into_iter().next())
        })
    }

    fn find_by_ids(&self, _ids: &[Value]) -> Result<Vec<Option<Record>>> {
        Err(Self::not_supported("find_by_ids"))
    }

    #[instrument(skip(self, params), fields(operation = "count", backend = BACKEND, collection = %self.config.collection))]
    fn count(&self, params: &Record) -> Result<u64> {
        timed(BACKEND, "count", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            let filter = build_filter(&descriptor)?;
            tracing::debug!(filter = %filter, "count");
            let session = self.session.get()?;
            let collection = &session.collection;
            self.run(&session, "count", async move {
                collection.count_documents(filter).await
            })
        })
    }

    #[instrument(skip(self, record), fields(operation = "insert", backend = BACKEND, collection = %self.config.collection))]
    fn insert(&self, record: Record) -> Result<Record> {
        timed(BACKEND, "insert", || {
            let document = record_to_document(&record)?;
            let session = self.session.get()?;
            let collection = &session.collection;
            let inserted = self.run(&session, "insert", async move {
                collection.insert_one(document).await
            })?;
            let mut record = record;
            record.set(query::ID, bson_to_value(inserted.inserted_id));
            Ok(record)
        })
    }

    fn update(&self, _record: Record) -> Result<Record> {
        Err(Self::not_supported("update"))
    }

    fn update_by_id(&self, _id: &Value, _changes: Record) -> Result<Record> {
        Err(Self::not_supported("update_by_id"))
    }

    fn remove_by_id(&self, _id: &Value) -> Result<Option<Record>> {
        Err(Self::not_supported("remove_by_id"))
    }

    #[instrument(skip(self), fields(operation = "remove_all", backend = BACKEND, collection = %self.config.collection))]
    fn remove_all(&self) -> Result<u64> {
        timed(BACKEND, "remove_all", || {
            let session = self.session.get()?;
            let collection = &session.collection;
            let deleted = self.run(&session, "remove_all", async move {
                collection.delete_many(doc! {}).await
            })?;
            Ok(deleted.deleted_count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> DocumentAdapter {
        DocumentAdapter::new(DocumentConfig::new(
            "mongodb://localhost:27017",
            "omnistore_test",
            "users",
        ))
    }

    #[test]
    fn test_unimplemented_operations_are_tagged() {
        let adapter = adapter();
        let record = Record::from_value(json!({"id": "x", "name": "Ana"})).unwrap();

        for result in [
            adapter.update(record.clone()).map(|_| ()),
            adapter.update_by_id(&json!("x"), record).map(|_| ()),
            adapter.remove_by_id(&json!("x")).map(|_| ()),
            adapter.find_by_ids(&[json!("x")]).map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(Error::NotSupported { backend: "mongodb", .. })
            ));
        }
    }

    #[test]
    fn test_operations_require_connection() {
        let adapter = adapter();
        assert!(!adapter.is_connected());
        assert!(matches!(
            adapter.find(&Record::new()),
            Err(Error::NotConnected { backend: "mongodb" })
        ));
        assert!(matches!(
            adapter.count(&Record::new()),
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            adapter.insert(Record::new()),
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            adapter.disconnect(),
            Err(Error::NotConnected { .. })
        ));
    }

    #[test]
    fn test_invalid_request_rejected_before_connection() {
        let adapter = adapter();
        let params = Record::from_value(json!({"query": "not an object"})).unwrap();
        assert!(matches!(adapter.find(&params), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unreachable_server_fails_connect() {
        let adapter = DocumentAdapter::new(
            DocumentConfig::new(
                "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200",
                "omnistore_test",
                "users",
            )
            .with_timeout(Duration::from_millis(500)),
        );
        assert!(matches!(
            adapter.connect(),
            Err(Error::ConnectionFailed { backend: "mongodb", .. })
        ));
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_config_from_toml_defaults_timeout() {
        let config: DocumentConfig = toml::from_str(
            r#"
            uri = "mongodb://db:27017"
            database = "app"
            collection = "users"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }
}
