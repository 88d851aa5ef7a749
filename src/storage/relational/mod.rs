//! Relational adapter over pooled `SQLite` connections.
//!
//! The table is created on connect from a static column list plus an
//! auto-incrementing integer identifier column.
//!
//! # Concurrency Model
//!
//! Every operation checks out one connection from a bounded `r2d2` pool
//! (default size 1) and returns it when done, including on error. Checkout
//! blocks until a connection is free. The engine's busy timeout bounds waits
//! on its own locks. An in-memory database is shared by the whole pool and
//! served by a single connection.
//!
//! # Values
//!
//! Values are always bound as parameters, coerced by declared column type:
//!
//! | Type | Bound as | Read back as |
//! |------|----------|--------------|
//! | `TEXT` | text | string |
//! | `NUMBER` | real | float |
//! | `INTEGER` | integer | integer |
//! | none / other | by JSON type | by stored type |

mod pool;
mod sql;

use crate::models::{QueryDescriptor, Record, value_to_string};
use crate::storage::metrics::timed;
use crate::storage::state::ConnectionSlot;
use crate::storage::traits::{Adapter, parse_descriptor};
use crate::{Error, Result};
use pool::ConnectionPool;
use rusqlite::{OpenFlags, params_from_iter};
use serde::Deserialize;
use serde_json::Value;
use sql::{Schema, Statement, decode_row};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// `TEXT`
    Text,
    /// `NUMBER`, read back as floating point
    Number,
    /// `INTEGER`
    Integer,
    /// Any other declaration, passed through to the DDL.
    Other(String),
}

impl ColumnType {
    /// Name as written in the DDL.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text => "TEXT",
            Self::Number => "NUMBER",
            Self::Integer => "INTEGER",
            Self::Other(name) => name,
        }
    }

    /// Validated DDL declaration.
    fn declaration(&self) -> Result<&str> {
        let name = self.name();
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ',');
        if name.is_empty() || !name.chars().all(allowed) {
            return Err(Error::InvalidInput(format!("invalid column type '{name}'")));
        }
        Ok(name)
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "NUMBER" => Self::Number,
            "INTEGER" => Self::Integer,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// A configured column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Column {
    /// Record field name.
    pub name: String,
    /// Declared type. `None` leaves the column untyped.
    #[serde(default, rename = "type")]
    pub column_type: Option<ColumnType>,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: Option<ColumnType>) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Translates record field names to SQL column names.
#[derive(Clone)]
pub struct ColumnNames(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl ColumnNames {
    /// Wraps a translation function.
    pub fn new(translate: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(translate))
    }

    /// Translates one field name.
    #[must_use]
    pub fn translate(&self, field: &str) -> String {
        (self.0)(field)
    }
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self::new(|field: &str| field.to_string())
    }
}

impl fmt::Debug for ColumnNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ColumnNames(..)")
    }
}

/// `SQLite` open flags accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenFlag {
    /// Open read-only.
    ReadOnly,
    /// Open read-write.
    ReadWrite,
    /// Create the database if missing.
    Create,
    /// Interpret the path as a URI.
    Uri,
    /// Open an in-memory database.
    Memory,
    /// Multi-thread mode.
    NoMutex,
    /// Serialized mode.
    FullMutex,
    /// Enable shared cache.
    SharedCache,
    /// Disable shared cache.
    PrivateCache,
}

impl OpenFlag {
    const fn bits(self) -> OpenFlags {
        match self {
            Self::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            Self::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            Self::Create => OpenFlags::SQLITE_OPEN_CREATE,
            Self::Uri => OpenFlags::SQLITE_OPEN_URI,
            Self::Memory => OpenFlags::SQLITE_OPEN_MEMORY,
            Self::NoMutex => OpenFlags::SQLITE_OPEN_NO_MUTEX,
            Self::FullMutex => OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            Self::SharedCache => OpenFlags::SQLITE_OPEN_SHARED_CACHE,
            Self::PrivateCache => OpenFlags::SQLITE_OPEN_PRIVATE_CACHE,
        }
    }
}

const fn default_pool_size() -> usize {
    1
}

const fn default_timeout_ms() -> u64 {
    2_000
}

fn default_id_field() -> String {
    crate::models::query::ID.to_string()
}

/// Configuration for [`RelationalAdapter`].
#[derive(Debug, Clone, Deserialize)]
pub struct RelationalConfig {
    /// Database path or `file:` URI.
    pub uri: String,
    /// Open flags. Empty means read-write, create, URI, no-mutex.
    #[serde(default)]
    pub flags: Vec<OpenFlag>,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Engine busy timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Table name.
    pub table: String,
    /// Columns other than the identifier.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Identifier column and record field.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Default projection. Empty means every column.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field-to-column name translation.
    #[serde(skip)]
    pub column_names: ColumnNames,
}

impl RelationalConfig {
    /// Creates a configuration with defaults for everything but location and table.
    #[must_use]
    pub fn new(uri: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            flags: Vec::new(),
            pool_size: default_pool_size(),
            timeout_ms: default_timeout_ms(),
            table: table.into(),
            columns: Vec::new(),
            id_field: default_id_field(),
            fields: Vec::new(),
            column_names: ColumnNames::default(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, column_type: Option<ColumnType>) -> Self {
        self.columns.push(Column::new(name, column_type));
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the field-to-column name translation.
    #[must_use]
    pub fn with_column_names(mut self, column_names: ColumnNames) -> Self {
        self.column_names = column_names;
        self
    }

    /// Busy timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn open_flags(&self) -> OpenFlags {
        if self.flags.is_empty() {
            return OpenFlags::default();
        }
        self.flags
            .iter()
            .fold(OpenFlags::empty(), |acc, flag| acc | flag.bits())
    }
}

/// Adapter over a pooled `SQLite` database.
pub struct RelationalAdapter {
    config: RelationalConfig,
    schema: Schema,
    pool: ConnectionSlot<ConnectionPool>,
}

impl RelationalAdapter {
    /// Creates an adapter. Nothing is opened until [`Adapter::connect`].
    #[must_use]
    pub fn new(config: RelationalConfig) -> Self {
        let schema = Schema::new(
            &config.table,
            &config.id_field,
            &config.columns,
            &config.fields,
            &config.column_names,
        );
        Self {
            config,
            schema,
            pool: ConnectionSlot::new(BACKEND),
        }
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn sql_error(&self, operation: &str, sql: &str, e: &rusqlite::Error) -> Error {
        tracing::error!(
            table = %self.config.table,
            operation,
            sql,
            error = %e,
            "SQLite statement failed"
        );
        Error::OperationFailed {
            operation: operation.to_string(),
            target: self.config.table.clone(),
            cause: e.to_string(),
        }
    }

    fn execute(&self, operation: &str, (sql, params): &Statement) -> Result<(usize, i64)> {
        tracing::debug!(sql = %sql, params = params.len(), "executing");
        self.pool.get()?.with_connection(|conn| {
            let changed = conn
                .execute(sql, params_from_iter(params.iter()))
                .map_err(|e| self.sql_error(operation, sql, &e))?;
            Ok((changed, conn.last_insert_rowid()))
        })
    }

    fn query(&self, descriptor: &QueryDescriptor) -> Result<Vec<Record>> {
        let ((sql, params), columns) = self.schema.select(descriptor)?;
        tracing::debug!(sql = %sql, params = params.len(), "querying");
        self.pool.get()?.with_connection(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| self.sql_error("find", &sql, &e))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| decode_row(row, &columns))
                .map_err(|e| self.sql_error("find", &sql, &e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| self.sql_error("find", &sql, &e))
        })
    }

    /// Descriptor matching one identifier, or `None` if the value can never
    /// be an integer row id.
    fn id_descriptor(&self, id: &Value) -> Option<QueryDescriptor> {
        if sql::bind(id, Some(&ColumnType::Integer)).is_err() {
            tracing::debug!(id = %id, "identifier is not a row id");
            return None;
        }
        Some(
            QueryDescriptor::new()
                .with_query(self.schema.id_field(), id.clone())
                .with_limit(1),
        )
    }
}

impl Adapter for RelationalAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "connect", backend = BACKEND, table = %self.config.table))]
    fn connect(&self) -> Result<()> {
        if self.pool.is_set() {
            tracing::debug!("already connected");
            return Ok(());
        }
        let create = self.schema.create_table()?;
        let pool = ConnectionPool::open(
            &self.config.uri,
            self.config.open_flags(),
            self.config.pool_size,
            self.config.timeout(),
        )
        .inspect_err(|e| tracing::error!(error = %e, "could not open SQLite pool"))?;

        tracing::debug!(sql = %create, "creating table");
        pool.with_connection(|conn| {
            conn.execute_batch(&create).map_err(|e| {
                tracing::error!(error = %e, "could not create table");
                Error::ConnectionFailed {
                    backend: BACKEND,
                    cause: format!("could not create table '{}': {e}", self.config.table),
                }
            })
        })?;

        tracing::debug!(pool_size = pool.size(), "SQLite pool ready");
        self.pool.install(pool);
        Ok(())
    }

    #[instrument(skip(self), fields(operation = "disconnect", backend = BACKEND, table = %self.config.table))]
    fn disconnect(&self) -> Result<()> {
        self.pool
            .take()
            .map(drop)
            .ok_or(Error::NotConnected { backend: BACKEND })
    }

    fn is_connected(&self) -> bool {
        self.pool.is_set()
    }

    #[instrument(skip(self, params), fields(operation = "find", backend = BACKEND, table = %self.config.table))]
    fn find(&self, params: &Record) -> Result<Vec<Record>> {
        timed(BACKEND, "find", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            self.query(&descriptor)
        })
    }

    #[instrument(skip(self), fields(operation = "find_by_id", backend = BACKEND, table = %self.config.table))]
    fn find_by_id(&self, id: &Value) -> Result<Option<Record>> {
        timed(BACKEND, "find_by_id", || {
            self.pool.get()?;
            let Some(descriptor) = self.id_descriptor(id) else {
                return Ok(None);
            };
            Ok(self.query(&descriptor)?.into_iter().next())
        })
    }

    #[instrument(skip(self, params), fields(operation = "count", backend = BACKEND, table = %self.config.table))]
    fn count(&self, params: &Record) -> Result<u64> {
        timed(BACKEND, "count", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            let (sql, params) = self.schema.count(&descriptor)?;
            tracing::debug!(sql = %sql, params = params.len(), "counting");
            let count: i64 = self.pool.get()?.with_connection(|conn| {
                conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
                    .map_err(|e| self.sql_error("count", &sql, &e))
            })?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    #[instrument(skip(self, record), fields(operation = "insert", backend = BACKEND, table = %self.config.table))]
    fn insert(&self, record: Record) -> Result<Record> {
        timed(BACKEND, "insert", || {
            let statement = self.schema.insert(&record)?;
            let (_, row_id) = self.execute("insert", &statement)?;
            let mut record = record;
            record.set(self.schema.id_field(), row_id);
            tracing::debug!(id = row_id, "record inserted");
            Ok(record)
        })
    }

    #[instrument(skip(self, changes), fields(operation = "update_by_id", backend = BACKEND, table = %self.config.table))]
    fn update_by_id(&self, id: &Value, changes: Record) -> Result<Record> {
        timed(BACKEND, "update_by_id", || {
            let not_found = || Error::NotFound {
                target: self.config.table.clone(),
                id: value_to_string(id),
            };
            self.pool.get()?;
            if self.id_descriptor(id).is_none() {
                return Err(not_found());
            }
            if let Some(statement) = self.schema.update(id, &changes)? {
                let (changed, _) = self.execute("update", &statement)?;
                if changed == 0 {
                    return Err(not_found());
                }
            }
            self.find_by_id(id)?.ok_or_else(not_found)
        })
    }

    #[instrument(skip(self), fields(operation = "remove_by_id", backend = BACKEND, table = %self.config.table))]
    fn remove_by_id(&self, id: &Value) -> Result<Option<Record>> {
        timed(BACKEND, "remove_by_id", || {
            let Some(existing) = self.find_by_id(id)? else {
                return Ok(None);
            };
            let (changed, _) = self.execute("remove_by_id", &self.schema.delete_by_id(id)?)?;
            Ok((changed > 0).then_some(existing))
        })
    }

    #[instrument(skip(self), fields(operation = "remove_all", backend = BACKEND, table = %self.config.table))]
    fn remove_all(&self) -> Result<u64> {
        timed(BACKEND, "remove_all", || {
            let (removed, _) = self.execute("remove_all", &(self.schema.delete_all(), Vec::new()))?;
            Ok(removed as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn books() -> (TempDir, RelationalAdapter) {
        let dir = tempfile::tempdir().unwrap();
        let config = RelationalConfig::new(
            dir.path().join("books.db").to_string_lossy().into_owned(),
            "books",
        )
        .with_column("title", Some(ColumnType::Text))
        .with_column("year", Some(ColumnType::Integer))
        .with_column("price", Some(ColumnType::Number));
        let adapter = RelationalAdapter::new(config);
        adapter.connect().unwrap();
        (dir, adapter)
    }

    #[test]
    fn test_operations_require_connection() {
        let adapter = RelationalAdapter::new(RelationalConfig::new(":memory:", "t"));
        assert!(matches!(
            adapter.find(&Record::new()),
            Err(Error::NotConnected { backend: "sqlite" })
        ));
        assert!(matches!(
            adapter.find_by_id(&json!(1)),
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            adapter.remove_all(),
            Err(Error::NotConnected { .. })
        ));
        assert!(adapter.disconnect().is_err());
    }

    #[test]
    fn test_title_update_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelationalConfig::new(
            dir.path().join("notes.db").to_string_lossy().into_owned(),
            "notes",
        )
        .with_column("title", Some(ColumnType::Text));
        let adapter = RelationalAdapter::new(config);
        adapter.connect().unwrap();

        let inserted = adapter.insert(record(json!({"title": "x"}))).unwrap();
        assert_eq!(inserted, record(json!({"title": "x", "id": 1})));

        adapter.update(record(json!({"id": 1, "title": "y"}))).unwrap();
        assert_eq!(
            adapter.find_by_id(&json!(1)).unwrap(),
            Some(record(json!({"title": "y", "id": 1})))
        );
    }

    #[test]
    fn test_connect_is_idempotent_and_table_survives_reconnect() {
        let (_dir, adapter) = books();
        adapter.insert(record(json!({"title": "Dune"}))).unwrap();
        adapter.connect().unwrap();

        adapter.disconnect().unwrap();
        adapter.connect().unwrap();
        assert_eq!(adapter.count(&Record::new()).unwrap(), 1);
    }

    #[test]
    fn test_find_with_query_search_sort_and_paging() {
        let (_dir, adapter) = books();
        for (title, year) in [("Dune", 1965), ("Emma", 1815), ("Ubik", 1969), ("Dracula", 1897)] {
            adapter
                .insert(record(json!({"title": title, "year": year, "price": 9.5})))
                .unwrap();
        }

        let params = record(json!({"sort": "-year", "limit": 2, "offset": 1}));
        let titles: Vec<_> = adapter
            .find(&params)
            .unwrap()
            .iter()
            .map(|r| r.get_string("title").unwrap())
            .collect();
        assert_eq!(titles, ["Dune", "Dracula"]);

        let params = record(json!({"searchFields": ["title"], "search": "Emma"}));
        let found = adapter.find(&params).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("year"), Some(&json!(1815)));
        assert_eq!(found[0].get("price"), Some(&json!(9.5)));

        let params = record(json!({"searchFields": "year", "search": "1969"}));
        assert_eq!(adapter.count(&params).unwrap(), 1);

        let params = record(json!({"query": {"price": 9.5}, "limit": 1}));
        assert_eq!(adapter.find(&params).unwrap().len(), 1);
        assert_eq!(adapter.count(&params).unwrap(), 4);
    }

    #[test]
    fn test_fields_projection() {
        let (_dir, adapter) = books();
        adapter.insert(record(json!({"title": "Dune", "year": 1965}))).unwrap();

        let found = adapter.find(&record(json!({"fields": ["title"]}))).unwrap();
        assert_eq!(found, vec![record(json!({"title": "Dune"}))]);
    }

    #[test]
    fn test_quote_in_search_is_literal() {
        let (_dir, adapter) = books();
        adapter.insert(record(json!({"title": "O'Brien"}))).unwrap();
        adapter.insert(record(json!({"title": "Other"}))).unwrap();

        let exact = record(json!({"searchFields": ["title"], "search": "O'Brien"}));
        assert_eq!(adapter.find(&exact).unwrap().len(), 1);

        let injected = record(json!({"searchFields": ["title"], "search": "x' OR '1'='1"}));
        assert!(adapter.find(&injected).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_column_is_invalid_input() {
        let (_dir, adapter) = books();
        assert!(matches!(
            adapter.insert(record(json!({"author": "Herbert"}))),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            adapter.find(&record(json!({"sort": "author"}))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let (_dir, adapter) = books();
        assert!(matches!(
            adapter.update_by_id(&json!(42), record(json!({"title": "x"}))),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            adapter.update_by_id(&json!("abc"), record(json!({"title": "x"}))),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_by_id_returns_removed_row() {
        let (_dir, adapter) = books();
        let dune = adapter.insert(record(json!({"title": "Dune"}))).unwrap();
        let id = dune.get("id").unwrap().clone();

        let removed = adapter.remove_by_id(&id).unwrap().unwrap();
        assert_eq!(removed.get("title"), Some(&json!("Dune")));
        assert_eq!(adapter.remove_by_id(&id).unwrap(), None);
        assert_eq!(adapter.remove_by_id(&json!("missing")).unwrap(), None);
    }

    #[test]
    fn test_find_by_ids_keeps_slots_for_missing() {
        let (_dir, adapter) = books();
        let a = adapter.insert(record(json!({"title": "A"}))).unwrap();
        let b = adapter.insert(record(json!({"title": "B"}))).unwrap();

        let found = adapter
            .find_by_ids(&[
                a.get("id").unwrap().clone(),
                json!("missing"),
                b.get("id").unwrap().clone(),
            ])
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].as_ref().unwrap().get("title"), Some(&json!("A")));
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().get("title"), Some(&json!("B")));
    }

    #[test]
    fn test_remove_all_returns_count() {
        let (_dir, adapter) = books();
        adapter.insert(record(json!({"title": "A"}))).unwrap();
        adapter.insert(record(json!({"title": "B"}))).unwrap();
        assert_eq!(adapter.remove_all().unwrap(), 2);
        assert_eq!(adapter.count(&Record::new()).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_inserts_through_pool() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelationalConfig::new(
            dir.path().join("pool.db").to_string_lossy().into_owned(),
            "t",
        )
        .with_column("n", Some(ColumnType::Integer))
        .with_pool_size(3);
        let adapter = Arc::new(RelationalAdapter::new(config));
        adapter.connect().unwrap();

        let handles: Vec<_> = (0..6)
            .map(|n| {
                let adapter = Arc::clone(&adapter);
                std::thread::spawn(move || adapter.insert(record(json!({"n": n}))).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(adapter.count(&Record::new()).unwrap(), 6);
    }

    #[test]
    fn test_concurrent_inserts_into_memory_database() {
        let config = RelationalConfig::new(":memory:", "t")
            .with_column("n", Some(ColumnType::Integer))
            .with_pool_size(2);
        let adapter = Arc::new(RelationalAdapter::new(config));
        adapter.connect().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let adapter = Arc::clone(&adapter);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        adapter.insert(record(json!({"n": t * 100 + n}))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(adapter.count(&Record::new()).unwrap(), 400);
        assert_eq!(adapter.find(&record(json!({"query": {"n": 742}}))).unwrap().len(), 1);
    }

    #[test]
    fn test_column_type_from_config_string() {
        assert_eq!(ColumnType::from("text"), ColumnType::Text);
        assert_eq!(ColumnType::from("NUMBER"), ColumnType::Number);
        assert_eq!(ColumnType::from("BLOB"), ColumnType::Other("BLOB".to_string()));
        assert!(ColumnType::from("TEXT); DROP TABLE x; --").declaration().is_err());
    }
}
