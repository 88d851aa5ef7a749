//! # Omnistore
//!
//! One CRUD-and-query contract implemented against three storage backends.
//!
//! Callers build a request [`Record`] (filter fields, an optional multi-field
//! search, sort, pagination) and hand it to whichever [`Adapter`] was chosen
//! at configuration time. Each adapter translates the request into its
//! backend's native retrieval mechanism and returns records in the same shape.
//!
//! ## Backends
//!
//! - [`EmbeddedAdapter`]: in-process transactional store (`redb`) with
//!   composite secondary indexes
//! - [`DocumentAdapter`]: `MongoDB` collection reached over the network
//! - [`RelationalAdapter`]: `SQLite` table behind a bounded connection pool
//!
//! ## Example
//!
//! ```rust,ignore
//! use omnistore::{Adapter, EmbeddedAdapter, EmbeddedConfig, IndexSpec, Record};
//! use serde_json::json;
//!
//! let adapter = EmbeddedAdapter::new(
//!     EmbeddedConfig::in_memory("users").with_index(IndexSpec::new(["name"])),
//! );
//! adapter.connect()?;
//! let ana = adapter.insert(Record::from_value(json!({"name": "Ana", "age": 30}))?)?;
//! let found = adapter.find(&Record::from_value(json!({
//!     "searchFields": ["name"],
//!     "search": "Ana",
//! }))?)?;
//! assert_eq!(found, vec![ana]);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Duplicate transitive versions come from the mongodb driver's dependency tree.
#![allow(clippy::multiple_crate_versions)]

use std::time::Duration;
use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::{BackendKind, StorageConfig};
pub use models::{QueryDescriptor, Record, SortDirection, SortKey};
pub use storage::{
    Adapter, Column, ColumnNames, ColumnType, DocumentAdapter, DocumentConfig, EmbeddedAdapter,
    EmbeddedConfig, IdGenerator, IndexKeyCodec, IndexSpec, RandomIdGenerator, RelationalAdapter,
    RelationalConfig,
};

/// Error type for adapter operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed request fields, unknown columns, non-object records |
/// | `ConnectionFailed` | `connect` cannot open the backend or create its schema |
/// | `NotConnected` | Any operation before `connect` or after `disconnect` |
/// | `NotFound` | `update`/`update_by_id` target id does not exist |
/// | `OperationFailed` | Backend-native failure (constraint, decode, network, SQL) |
/// | `NotSupported` | Operation the backend deliberately does not provide |
/// | `Timeout` | Document store call exceeded its deadline, or a pool checkout gave up |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - `limit`/`offset` are negative or not integers
    /// - `query` is not an object
    /// - A relational request names a column outside the configured schema
    /// - A composite index key is built from a non-string component
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend could not be opened or initialised.
    ///
    /// Setup failures are fatal for the adapter instance and never retried.
    #[error("{backend}: connection failed: {cause}")]
    ConnectionFailed {
        /// Backend name.
        backend: &'static str,
        /// The underlying cause.
        cause: String,
    },

    /// The adapter has no live connection.
    #[error("{backend}: no connection available, call connect() first")]
    NotConnected {
        /// Backend name.
        backend: &'static str,
    },

    /// No record exists with the given identifier.
    #[error("record '{id}' not found in '{target}'")]
    NotFound {
        /// Table or collection name.
        target: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A backend operation failed.
    ///
    /// Raised when:
    /// - A unique index constraint is violated
    /// - A stored row or document cannot be decoded
    /// - The SQL engine rejects a statement
    /// - The document store reports a network or server error
    #[error("operation '{operation}' on '{target}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// Table or collection name.
        target: String,
        /// The underlying cause.
        cause: String,
    },

    /// The backend does not implement this operation.
    #[error("{backend}: operation '{operation}' is not supported")]
    NotSupported {
        /// Backend name.
        backend: &'static str,
        /// The unsupported operation.
        operation: &'static str,
    },

    /// A call exceeded its deadline.
    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The configured per-call timeout.
        timeout: Duration,
    },
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;
