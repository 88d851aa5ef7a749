//! The uniform adapter contract.
//!
//! Every backend implements the same CRUD-and-query surface. Requests are
//! [`Record`]s carrying the wire fields `search`, `searchFields`, `query`,
//! `sort`, `limit`, `offset`, `fields`, `id` and `ids`.
//!
//! # Available Implementations
//!
//! | Adapter | Backend | Identifier |
//! |---------|---------|------------|
//! | `EmbeddedAdapter` | `redb`, in-process | 12-character random string |
//! | `DocumentAdapter` | `MongoDB` | engine `ObjectId`, exposed as hex |
//! | `RelationalAdapter` | `SQLite`, pooled | auto-increment integer |
//!
//! # Error Modes and Guarantees
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Called before `connect` / after `disconnect` | `Error::NotConnected` |
//! | `find_one`, `find_by_id`, `remove_by_id` on a missing id | `Ok(None)` |
//! | `find_by_ids` with some missing ids | `None` in those slots, batch continues |
//! | `update`, `update_by_id` on a missing id | `Error::NotFound` |
//! | Backend feature gap | `Error::NotSupported` |
//! | Backend-native failure | `Error::OperationFailed` with operation and table |
//!
//! Nothing is retried inside an adapter.

use crate::Result;
use crate::models::{QueryDescriptor, Record, extract_id, query};
use serde_json::Value;

/// Trait for storage adapters.
///
/// # Implementor Notes
///
/// - Methods use `&self` so one adapter can be shared via `Arc<dyn Adapter>`
/// - Connection state lives behind interior mutability
/// - `count` must apply the same filter as `find` and ignore pagination
pub trait Adapter: Send + Sync {
    /// Short backend name used in errors, logs and metrics.
    fn backend(&self) -> &'static str;

    /// Opens the backend. Must succeed before any other operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectionFailed`] if the backend cannot be
    /// opened or its schema cannot be created.
    fn connect(&self) -> Result<()>;

    /// Releases the backend. Later operations fail with `NotConnected`.
    fn disconnect(&self) -> Result<()>;

    /// Returns true between a successful `connect` and `disconnect`.
    fn is_connected(&self) -> bool;

    /// Returns every record matching the request.
    fn find(&self, params: &Record) -> Result<Vec<Record>>;

    /// Returns the first record matching the request.
    fn find_one(&self, params: &Record) -> Result<Option<Record>> {
        let mut params = params.clone();
        params.set(query::LIMIT, 1);
        Ok(self.find(&params)?.into_iter().next())
    }

    /// Returns the record with the given identifier.
    fn find_by_id(&self, id: &Value) -> Result<Option<Record>>;

    /// Looks up each identifier in turn, in request order.
    ///
    /// A missing identifier yields `None` in its slot rather than failing
    /// the batch.
    fn find_by_ids(&self, ids: &[Value]) -> Result<Vec<Option<Record>>> {
        ids.iter().map(|id| self.find_by_id(id)).collect()
    }

    /// Counts the records `find` would return, ignoring pagination.
    fn count(&self, params: &Record) -> Result<u64>;

    /// Stores a record and returns it with its assigned identifier.
    fn insert(&self, record: Record) -> Result<Record>;

    /// Applies the fields of `record` to the stored record with the same `id`.
    fn update(&self, record: Record) -> Result<Record> {
        let id = extract_id(&record)?;
        let mut changes = record;
        changes.remove(query::ID);
        self.update_by_id(&id, changes)
    }

    /// Applies `changes` to the stored record and returns the result.
    fn update_by_id(&self, id: &Value, changes: Record) -> Result<Record>;

    /// Deletes a record, returning it, or `None` if nothing matched.
    fn remove_by_id(&self, id: &Value) -> Result<Option<Record>>;

    /// Deletes every record and returns how many were removed.
    fn remove_all(&self) -> Result<u64>;
}

/// Parses the descriptor portion of a request, logging rejected requests.
pub(crate) fn parse_descriptor(backend: &'static str, params: &Record) -> Result<QueryDescriptor> {
    QueryDescriptor::parse(params).inspect_err(|e| {
        tracing::warn!(backend, error = %e, "rejected request");
    })
}
