//! Embedded indexed adapter.
//!
//! Records live in an in-process `redb` database: one primary table keyed by
//! the record identifier, plus one multimap table per declared index mapping
//! a composite key (see [`IndexKeyCodec`]) to identifiers.
//!
//! # Lookup resolution
//!
//! Indexes only narrow the candidates; every hit is re-checked against the
//! request, so declaring an index never changes what a request returns.
//!
//! | Request | Resolution |
//! |---------|------------|
//! | Scalar `search`, every field is `id` or has a single-field index | Primary/index lookups, unioned |
//! | Scalar `search`, any other fields | Snapshot scan, equality OR'ed across the fields |
//! | List `search`, fields name a declared index (joined with `-`) | Exact composite key lookup |
//! | List `search`, no such index | Snapshot scan, equality AND'ed per field |
//! | No search | Snapshot scan |
//!
//! Candidates come back in identifier order. `query`, `sort`, `offset`,
//! `limit` and `fields` are then applied in process.
//!
//! # Concurrency Model
//!
//! Reads run in a read transaction and see one consistent snapshot; they
//! never block on, or are blocked by, an in-flight writer. Writes run in
//! serialized write transactions. An update reads, deletes and re-inserts
//! the row inside a single write transaction, so concurrent readers see
//! either the old row or the new one, never a gap.

mod evaluate;
mod id;
mod index_key;

pub use id::{IdGenerator, RandomIdGenerator};
pub use index_key::{IndexKeyCodec, KEY_SEPARATOR};

use crate::models::{QueryDescriptor, Record, query, value_to_string};
use crate::storage::metrics::timed;
use crate::storage::state::ConnectionSlot;
use crate::storage::traits::{Adapter, parse_descriptor};
use crate::{Error, Result};
use redb::backends::InMemoryBackend;
use redb::{
    Database, MultimapTableDefinition, ReadTransaction, ReadableMultimapTable, ReadableTable,
    ReadableTableMetadata, TableDefinition, WriteTransaction,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

const BACKEND: &str = "redb";

type PrimaryTable<'a> = TableDefinition<'a, &'static str, &'static [u8]>;
type IndexTable<'a> = MultimapTableDefinition<'a, &'static [u8], &'static str>;

/// A secondary index over one or more record fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexSpec {
    /// Indexed fields, in key order.
    pub fields: Vec<String>,
    /// Lowercase keys on write and lookup.
    #[serde(default)]
    pub lowercase: bool,
    /// Reject inserts whose key is already present.
    #[serde(default)]
    pub unique: bool,
    /// Skip indexing records that lack a field instead of rejecting them.
    #[serde(default)]
    pub allow_missing: bool,
}

impl IndexSpec {
    /// Creates a non-unique, case-sensitive index over `fields`.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            lowercase: false,
            unique: false,
            allow_missing: false,
        }
    }

    /// Makes the index case-insensitive.
    #[must_use]
    pub const fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Lets records without the indexed fields through unindexed.
    #[must_use]
    pub const fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    /// Index name: the field names joined with `-`.
    #[must_use]
    pub fn name(&self) -> String {
        self.fields.join(KEY_SEPARATOR)
    }

    /// Key codec for this index.
    #[must_use]
    pub fn codec(&self) -> IndexKeyCodec {
        IndexKeyCodec::new(self.fields.iter().cloned(), self.lowercase)
    }
}

/// Configuration for [`EmbeddedAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmbeddedConfig {
    /// Table name.
    pub table: String,
    /// Database file. `None` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Secondary indexes. The `id` index is implicit.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl EmbeddedConfig {
    /// In-memory table with no secondary indexes.
    #[must_use]
    pub fn in_memory(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            path: None,
            indexes: Vec::new(),
        }
    }

    /// Stores the database in a file.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Declares a secondary index.
    #[must_use]
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A declared index with its resolved table name and codec.
struct Index {
    spec: IndexSpec,
    name: String,
    table: String,
    codec: IndexKeyCodec,
}

/// Where the hits for one search field come from.
enum Lookup<'a> {
    Primary,
    Index(&'a Index),
}

/// Adapter over an in-process `redb` database.
pub struct EmbeddedAdapter {
    config: EmbeddedConfig,
    indexes: Vec<Index>,
    ids: Arc<dyn IdGenerator>,
    db: ConnectionSlot<Database>,
}

impl EmbeddedAdapter {
    /// Creates an adapter that assigns 12-character random identifiers.
    #[must_use]
    pub fn new(config: EmbeddedConfig) -> Self {
        Self::with_id_generator(config, Arc::new(RandomIdGenerator::default()))
    }

    /// Creates an adapter with an explicit identifier source.
    #[must_use]
    pub fn with_id_generator(config: EmbeddedConfig, ids: Arc<dyn IdGenerator>) -> Self {
        let indexes = config
            .indexes
            .iter()
            .filter(|spec| spec.name() != query::ID)
            .map(|spec| Index {
                name: spec.name(),
                table: format!("{}.idx.{}", config.table, spec.name()),
                codec: spec.codec(),
                spec: spec.clone(),
            })
            .collect();
        Self {
            config,
            indexes,
            ids,
            db: ConnectionSlot::new(BACKEND),
        }
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn primary(&self) -> PrimaryTable<'_> {
        TableDefinition::new(&self.config.table)
    }

    fn index_table(index: &Index) -> IndexTable<'_> {
        MultimapTableDefinition::new(&index.table)
    }

    fn index_named(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Lookup that finds every record whose `field` equals a value.
    fn lookup_for(&self, field: &str) -> Option<Lookup<'_>> {
        if field == query::ID {
            return Some(Lookup::Primary);
        }
        self.indexes
            .iter()
            .find(|index| index.spec.fields == [field])
            .map(Lookup::Index)
    }

    fn store_error(&self, operation: &str, e: impl Display) -> Error {
        tracing::error!(
            table = %self.config.table,
            operation,
            error = %e,
            "embedded store operation failed"
        );
        Error::OperationFailed {
            operation: operation.to_string(),
            target: self.config.table.clone(),
            cause: e.to_string(),
        }
    }

    fn open_database(&self) -> Result<Database> {
        let connection_error = |e: &dyn Display| Error::ConnectionFailed {
            backend: BACKEND,
            cause: e.to_string(),
        };
        let db = match &self.config.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| connection_error(&e))?;
                }
                Database::create(path).map_err(|e| connection_error(&e))?
            },
            None => Database::builder()
                .create_with_backend(InMemoryBackend::new())
                .map_err(|e| connection_error(&e))?,
        };

        let txn = db.begin_write().map_err(|e| connection_error(&e))?;
        {
            txn.open_table(self.primary())
                .map_err(|e| connection_error(&e))?;
            for index in &self.indexes {
                txn.open_multimap_table(Self::index_table(index))
                    .map_err(|e| connection_error(&e))?;
            }
        }
        txn.commit().map_err(|e| connection_error(&e))?;
        Ok(db)
    }

    /// Loads and decodes one row from any readable primary table.
    fn load<T>(&self, table: &T, id: &str) -> Result<Option<Record>>
    where
        T: ReadableTable<&'static str, &'static [u8]>,
    {
        let Some(guard) = table.get(id).map_err(|e| self.store_error("get", e))? else {
            return Ok(None);
        };
        serde_json::from_slice(guard.value())
            .map(Some)
            .map_err(|e| self.store_error("decode", e))
    }

    fn scan<T>(&self, table: &T) -> Result<Vec<Record>>
    where
        T: ReadableTable<&'static str, &'static [u8]>,
    {
        let mut records = Vec::new();
        for entry in table.iter().map_err(|e| self.store_error("scan", e))? {
            let (_, value) = entry.map_err(|e| self.store_error("scan", e))?;
            records.push(
                serde_json::from_slice(value.value()).map_err(|e| self.store_error("decode", e))?,
            );
        }
        Ok(records)
    }

    /// Identifiers stored under `key` in an index.
    fn lookup_ids(&self, txn: &ReadTransaction, index: &Index, key: &[u8]) -> Result<Vec<String>> {
        let table = txn
            .open_multimap_table(Self::index_table(index))
            .map_err(|e| self.store_error("open_index", e))?;
        let mut ids = Vec::new();
        for id in table
            .get(key)
            .map_err(|e| self.store_error("index_lookup", e))?
        {
            ids.push(
                id.map_err(|e| self.store_error("index_lookup", e))?
                    .value()
                    .to_string(),
            );
        }
        Ok(ids)
    }

    /// Loads each id once and keeps the records `keep` accepts, in id order.
    fn collect_hits<T>(
        &self,
        primary: &T,
        ids: impl IntoIterator<Item = String>,
        hits: &mut BTreeMap<String, Record>,
        keep: impl Fn(&Record) -> bool,
    ) -> Result<()>
    where
        T: ReadableTable<&'static str, &'static [u8]>,
    {
        for id in ids {
            if hits.contains_key(&id) {
                continue;
            }
            if let Some(record) = self.load(primary, &id)? {
                if keep(&record) {
                    hits.insert(id, record);
                }
            }
        }
        Ok(())
    }

    /// Resolves the search portion of a descriptor against one snapshot.
    fn candidates(&self, db: &Database, descriptor: &QueryDescriptor) -> Result<Vec<Record>> {
        let txn = db
            .begin_read()
            .map_err(|e| self.store_error("begin_read", e))?;
        let primary = txn
            .open_table(self.primary())
            .map_err(|e| self.store_error("open_table", e))?;

        if let Some(pairs) = descriptor.composite_clause() {
            return self.composite_candidates(&txn, &primary, &pairs);
        }
        let Some((search, fields)) = descriptor.search_clause() else {
            return self.scan(&primary);
        };

        let keep = |record: &Record| evaluate::matches_search(record, search, fields);
        let Some(lookups) = fields
            .iter()
            .map(|field| self.lookup_for(field))
            .collect::<Option<Vec<_>>>()
        else {
            tracing::debug!(
                table = %self.config.table,
                fields = ?fields,
                "search field without a single-field index, scanning"
            );
            return Ok(self.scan(&primary)?.into_iter().filter(keep).collect());
        };

        let mut hits = BTreeMap::new();
        for lookup in lookups {
            let ids = match lookup {
                Lookup::Primary => vec![search.to_string()],
                Lookup::Index(index) => {
                    let key = index.codec.from_args(&[Value::String(search.to_string())])?;
                    self.lookup_ids(&txn, index, &key)?
                },
            };
            self.collect_hits(&primary, ids, &mut hits, keep)?;
        }
        Ok(hits.into_values().collect())
    }

    /// Resolves a composite match: one value per field, all equal.
    fn composite_candidates<T>(
        &self,
        txn: &ReadTransaction,
        primary: &T,
        pairs: &[(&str, &str)],
    ) -> Result<Vec<Record>>
    where
        T: ReadableTable<&'static str, &'static [u8]>,
    {
        let keep = |record: &Record| evaluate::matches_all(record, pairs);
        let name = pairs
            .iter()
            .map(|(field, _)| *field)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        let Some(index) = self.index_named(&name) else {
            tracing::debug!(table = %self.config.table, index = %name, "no composite index, scanning");
            return Ok(self.scan(primary)?.into_iter().filter(keep).collect());
        };

        let args: Vec<Value> = pairs
            .iter()
            .map(|(_, value)| Value::String((*value).to_string()))
            .collect();
        let key = index.codec.from_args(&args)?;
        let mut hits = BTreeMap::new();
        self.collect_hits(primary, self.lookup_ids(txn, index, &key)?, &mut hits, keep)?;
        Ok(hits.into_values().collect())
    }

    /// Computes the index keys a record contributes.
    fn index_keys(&self, record: &Record) -> Result<Vec<(&Index, Vec<u8>)>> {
        let mut keys = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            match index.codec.from_record(record) {
                Some(key) => keys.push((index, key)),
                None if index.spec.allow_missing => {},
                None => {
                    return Err(Error::InvalidInput(format!(
                        "field(s) `{}` required by index '{}' not found",
                        index.spec.fields.join("`, `"),
                        index.name
                    )));
                },
            }
        }
        Ok(keys)
    }

    fn insert_row(&self, txn: &WriteTransaction, id: &str, record: &Record) -> Result<()> {
        let keys = self.index_keys(record)?;
        let bytes = serde_json::to_vec(record).map_err(|e| self.store_error("encode", e))?;

        let mut primary = txn
            .open_table(self.primary())
            .map_err(|e| self.store_error("open_table", e))?;
        if primary
            .get(id)
            .map_err(|e| self.store_error("get", e))?
            .is_some()
        {
            return Err(self.store_error("insert", format!("duplicate id '{id}'")));
        }
        primary
            .insert(id, bytes.as_slice())
            .map_err(|e| self.store_error("insert", e))?;

        for (index, key) in keys {
            let mut table = txn
                .open_multimap_table(Self::index_table(index))
                .map_err(|e| self.store_error("open_index", e))?;
            if index.spec.unique
                && table
                    .get(key.as_slice())
                    .map_err(|e| self.store_error("index_lookup", e))?
                    .next()
                    .is_some()
            {
                return Err(self.store_error(
                    "insert",
                    format!("unique index '{}' violated", index.name),
                ));
            }
            table
                .insert(key.as_slice(), id)
                .map_err(|e| self.store_error("index_insert", e))?;
        }
        Ok(())
    }

    fn remove_row(&self, txn: &WriteTransaction, id: &str, record: &Record) -> Result<()> {
        let mut primary = txn
            .open_table(self.primary())
            .map_err(|e| self.store_error("open_table", e))?;
        primary
            .remove(id)
            .map_err(|e| self.store_error("delete", e))?;

        for index in &self.indexes {
            let Some(key) = index.codec.from_record(record) else {
                continue;
            };
            let mut table = txn
                .open_multimap_table(Self::index_table(index))
                .map_err(|e| self.store_error("open_index", e))?;
            table
                .remove(key.as_slice(), id)
                .map_err(|e| self.store_error("index_delete", e))?;
        }
        Ok(())
    }

    /// Runs `body` in a write transaction, committing on success and
    /// aborting on error so no partial state becomes visible.
    fn write<T>(&self, body: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
        let db = self.db.get()?;
        let txn = db
            .begin_write()
            .map_err(|e| self.store_error("begin_write", e))?;
        match body(&txn) {
            Ok(value) => {
                txn.commit().map_err(|e| self.store_error("commit", e))?;
                Ok(value)
            },
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    tracing::warn!(error = %abort, "failed to abort write transaction");
                }
                Err(e)
            },
        }
    }

    fn load_for_write(&self, txn: &WriteTransaction, id: &str) -> Result<Option<Record>> {
        let primary = txn
            .open_table(self.primary())
            .map_err(|e| self.store_error("open_table", e))?;
        self.load(&primary, id)
    }
}

impl Adapter for EmbeddedAdapter {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "connect", backend = BACKEND, table = %self.config.table))]
    fn connect(&self) -> Result<()> {
        if self.db.is_set() {
            tracing::debug!("already connected");
            return Ok(());
        }
        let db = self.open_database().inspect_err(|e| {
            tracing::error!(error = %e, "could not open embedded store");
        })?;
        self.db.install(db);
        tracing::debug!(indexes = self.indexes.len(), "embedded store ready");
        Ok(())
    }

    #[instrument(skip(self), fields(operation = "disconnect", backend = BACKEND, table = %self.config.table))]
    fn disconnect(&self) -> Result<()> {
        self.db
            .take()
            .map(drop)
            .ok_or(Error::NotConnected { backend: BACKEND })
    }

    fn is_connected(&self) -> bool {
        self.db.is_set()
    }

    #[instrument(skip(self, params), fields(operation = "find", backend = BACKEND, table = %self.config.table))]
    fn find(&self, params: &Record) -> Result<Vec<Record>> {
        timed(BACKEND, "find", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            let db = self.db.get()?;
            let candidates = self.candidates(&db, &descriptor)?;
            Ok(evaluate::apply(candidates, &descriptor))
        })
    }

    fn find_by_id(&self, id: &Value) -> Result<Option<Record>> {
        let params = Record::new()
            .with(query::SEARCH_FIELDS, vec![query::ID])
            .with(query::SEARCH, value_to_string(id));
        self.find_one(&params)
    }

    #[instrument(skip(self, params), fields(operation = "count", backend = BACKEND, table = %self.config.table))]
    fn count(&self, params: &Record) -> Result<u64> {
        timed(BACKEND, "count", || {
            let descriptor = parse_descriptor(BACKEND, params)?;
            let db = self.db.get()?;
            let matched = self
                .candidates(&db, &descriptor)?
                .iter()
                .filter(|record| evaluate::matches_query(record, &descriptor.query))
                .count();
            Ok(matched as u64)
        })
    }

    #[instrument(skip(self, record), fields(operation = "insert", backend = BACKEND, table = %self.config.table))]
    fn insert(&self, record: Record) -> Result<Record> {
        timed(BACKEND, "insert", || {
            let id = self.ids.generate();
            let mut record = record;
            record.set(query::ID, id.clone());
            self.write(|txn| self.insert_row(txn, &id, &record))?;
            tracing::debug!(id = %id, "record inserted");
            Ok(record)
        })
    }

    #[instrument(skip(self, changes), fields(operation = "update_by_id", backend = BACKEND, table = %self.config.table))]
    fn update_by_id(&self, id: &Value, changes: Record) -> Result<Record> {
        timed(BACKEND, "update_by_id", || {
            let id = value_to_string(id);
            let mut changes = changes;
            changes.remove(query::ID);
            self.write(|txn| {
                let existing =
                    self.load_for_write(txn, &id)?
                        .ok_or_else(|| Error::NotFound {
                            target: self.config.table.clone(),
                            id: id.clone(),
                        })?;
                let mut merged = existing.clone();
                merged.merge(&changes);
                self.remove_row(txn, &id, &existing)?;
                self.insert_row(txn, &id, &merged)?;
                Ok(merged)
            })
        })
    }

    #[instrument(skip(self), fields(operation = "remove_by_id", backend = BACKEND, table = %self.config.table))]
    fn remove_by_id(&self, id: &Value) -> Result<Option<Record>> {
        timed(BACKEND, "remove_by_id", || {
            let id = value_to_string(id);
            self.write(|txn| {
                let Some(existing) = self.load_for_write(txn, &id)? else {
                    return Ok(None);
                };
                self.remove_row(txn, &id, &existing)?;
                Ok(Some(existing))
            })
        })
    }

    #[instrument(skip(self), fields(operation = "remove_all", backend = BACKEND, table = %self.config.table))]
    fn remove_all(&self) -> Result<u64> {
        timed(BACKEND, "remove_all", || {
            self.write(|txn| {
                let removed = {
                    let primary = txn
                        .open_table(self.primary())
                        .map_err(|e| self.store_error("open_table", e))?;
                    primary.len().map_err(|e| self.store_error("len", e))?
                };
                txn.delete_table(self.primary())
                    .map_err(|e| self.store_error("delete_table", e))?;
                txn.open_table(self.primary())
                    .map_err(|e| self.store_error("open_table", e))?;
                for index in &self.indexes {
                    txn.delete_multimap_table(Self::index_table(index))
                        .map_err(|e| self.store_error("delete_index", e))?;
                    txn.open_multimap_table(Self::index_table(index))
                        .map_err(|e| self.store_error("open_index", e))?;
                }
                Ok(removed)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic identifiers: `id-1`, `id-2`, ...
    struct SequentialIds(AtomicU64);

    impl IdGenerator for SequentialIds {
        fn generate(&self) -> String {
            format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn users() -> EmbeddedAdapter {
        let config = EmbeddedConfig::in_memory("users")
            .with_index(IndexSpec::new(["name"]))
            .with_index(IndexSpec::new(["email"]).lowercase().unique().allow_missing())
            .with_index(IndexSpec::new(["name", "age"]).allow_missing());
        let adapter =
            EmbeddedAdapter::with_id_generator(config, Arc::new(SequentialIds(AtomicU64::new(0))));
        adapter.connect().unwrap();
        adapter
    }

    #[test]
    fn test_operations_require_connection() {
        let adapter = EmbeddedAdapter::new(EmbeddedConfig::in_memory("users"));
        assert!(matches!(
            adapter.find(&Record::new()),
            Err(Error::NotConnected { backend: "redb" })
        ));
        assert!(adapter.insert(Record::new()).is_err());

        adapter.connect().unwrap();
        adapter.disconnect().unwrap();
        assert!(matches!(
            adapter.count(&Record::new()),
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            adapter.disconnect(),
            Err(Error::NotConnected { .. })
        ));
    }

    #[test]
    fn test_insert_assigns_generated_id() {
        let adapter = users();
        let inserted = adapter.insert(record(json!({"name": "Ana"}))).unwrap();
        assert_eq!(inserted.get("id"), Some(&json!("id-1")));
        assert_eq!(
            adapter.find_by_id(&json!("id-1")).unwrap(),
            Some(inserted)
        );
    }

    #[test]
    fn test_random_ids_are_twelve_characters() {
        let adapter = EmbeddedAdapter::new(EmbeddedConfig::in_memory("t"));
        adapter.connect().unwrap();
        let inserted = adapter.insert(record(json!({"x": 1}))).unwrap();
        assert_eq!(inserted.get_string("id").unwrap().len(), 12);
    }

    #[test]
    fn test_find_through_single_field_index() {
        let adapter = users();
        adapter.insert(record(json!({"name": "Ana", "age": 30}))).unwrap();
        adapter.insert(record(json!({"name": "Bo", "age": 25}))).unwrap();

        let found = adapter
            .find(&record(json!({"searchFields": ["name"], "search": "Ana"})))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_find_through_composite_index() {
        let adapter = users();
        adapter.insert(record(json!({"name": "Ana", "age": 30}))).unwrap();
        adapter.insert(record(json!({"name": "Ana", "age": 31}))).unwrap();

        let found = adapter
            .find(&record(json!({"searchFields": ["name", "age"], "search": ["Ana", "31"]})))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("age"), Some(&json!(31)));

        // A scalar search keeps its OR meaning even when a composite index exists.
        let joined = record(json!({"searchFields": ["name", "age"], "search": "Ana-31"}));
        assert!(adapter.find(&joined).unwrap().is_empty());
        let either = record(json!({"searchFields": ["name", "age"], "search": "31"}));
        assert_eq!(adapter.count(&either).unwrap(), 1);
    }

    #[test]
    fn test_indexes_do_not_change_results() {
        let rows = [
            json!({"name": "Ana", "city": "Lisbon", "age": 30}),
            json!({"name": "Lisbon", "city": "Porto", "age": 25}),
            json!({"name": "Cy", "city": "Lisbon", "age": 30}),
            json!({"name": "ana", "city": "Faro"}),
        ];
        let plain = EmbeddedAdapter::new(EmbeddedConfig::in_memory("people"));
        let indexed = EmbeddedAdapter::new(
            EmbeddedConfig::in_memory("people")
                .with_index(IndexSpec::new(["name", "city"]))
                .with_index(IndexSpec::new(["name"]).lowercase())
                .with_index(IndexSpec::new(["city"]))
                .with_index(IndexSpec::new(["age"]).allow_missing()),
        );
        for adapter in [&plain, &indexed] {
            adapter.connect().unwrap();
            for row in &rows {
                adapter.insert(record(row.clone())).unwrap();
            }
        }

        let requests = [
            json!({"searchFields": ["name", "city"], "search": "Lisbon"}),
            json!({"searchFields": ["name", "city"], "search": "Ana-Lisbon"}),
            json!({"searchFields": ["name", "city"], "search": ["Ana", "Lisbon"]}),
            json!({"searchFields": ["name"], "search": "ana"}),
            json!({"searchFields": ["city", "age"], "search": "30"}),
            json!({"searchFields": ["age"], "search": 25}),
            json!({"searchFields": ["name", "nick"], "search": "Cy"}),
        ];
        for request in requests {
            let params = record(request.clone());
            let names = |adapter: &EmbeddedAdapter| -> Vec<String> {
                let mut names: Vec<String> = adapter
                    .find(&params)
                    .unwrap()
                    .iter()
                    .map(|r| r.get_string("name").unwrap())
                    .collect();
                names.sort();
                names
            };
            assert_eq!(names(&plain), names(&indexed), "request {request}");
            assert_eq!(
                plain.count(&params).unwrap(),
                indexed.count(&params).unwrap(),
                "request {request}"
            );
        }

        let lisbon = record(json!({"searchFields": ["name", "city"], "search": "Lisbon"}));
        assert_eq!(indexed.count(&lisbon).unwrap(), 3);
    }

    #[test]
    fn test_lowercase_unique_index() {
        let adapter = users();
        adapter
            .insert(record(json!({"name": "Ana", "email": "Ana@Example.com"})))
            .unwrap();

        let exact = record(json!({"searchFields": "email", "search": "Ana@Example.com"}));
        assert_eq!(adapter.find(&exact).unwrap().len(), 1);
        let other_case = record(json!({"searchFields": "email", "search": "ANA@example.COM"}));
        assert!(adapter.find(&other_case).unwrap().is_empty());

        let duplicate = adapter.insert(record(json!({"name": "Other", "email": "ana@example.com"})));
        assert!(matches!(duplicate, Err(Error::OperationFailed { .. })));
        assert_eq!(adapter.count(&Record::new()).unwrap(), 1);
    }

    #[test]
    fn test_missing_indexed_field_rejected() {
        let adapter = users();
        let result = adapter.insert(record(json!({"age": 3})));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(adapter.count(&Record::new()).unwrap(), 0);
    }

    #[test]
    fn test_unindexed_search_fields_are_ored() {
        let adapter = users();
        adapter
            .insert(record(json!({"name": "Ana", "city": "Porto", "nick": "x"})))
            .unwrap();
        adapter
            .insert(record(json!({"name": "Bo", "city": "Lisbon", "nick": "Porto"})))
            .unwrap();
        adapter
            .insert(record(json!({"name": "Cy", "city": "Faro", "nick": "y"})))
            .unwrap();

        let params = record(json!({"searchFields": ["city", "nick"], "search": "Porto"}));
        assert_eq!(adapter.find(&params).unwrap().len(), 2);
        assert_eq!(adapter.count(&params).unwrap(), 2);
    }

    #[test]
    fn test_sort_limit_offset_and_query() {
        let adapter = users();
        for (name, age) in [("Ana", 30), ("Bo", 25), ("Cy", 41), ("Di", 25)] {
            adapter
                .insert(record(json!({"name": name, "age": age})))
                .unwrap();
        }

        let found = adapter
            .find(&record(json!({"sort": "-age name", "offset": 1, "limit": 2})))
            .unwrap();
        let names: Vec<_> = found.iter().map(|r| r.get_string("name").unwrap()).collect();
        assert_eq!(names, ["Ana", "Bo"]);

        let params = record(json!({"query": {"age": 25}}));
        assert_eq!(adapter.find(&params).unwrap().len(), 2);
        assert_eq!(adapter.count(&params).unwrap(), 2);
    }

    #[test]
    fn test_update_merges_and_reindexes() {
        let adapter = users();
        let ana = adapter.insert(record(json!({"name": "Ana", "age": 30}))).unwrap();

        let updated = adapter
            .update(record(json!({"id": ana.get("id").unwrap(), "name": "Ana Maria"})))
            .unwrap();
        assert_eq!(updated.get("age"), Some(&json!(30)));
        assert_eq!(updated.get("id"), ana.get("id"));

        let old = record(json!({"searchFields": ["name"], "search": "Ana"}));
        assert!(adapter.find(&old).unwrap().is_empty());
        let new = record(json!({"searchFields": ["name"], "search": "Ana Maria"}));
        assert_eq!(adapter.find(&new).unwrap(), vec![updated]);
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let adapter = users();
        let result = adapter.update_by_id(&json!("nope"), record(json!({"name": "x"})));
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let result = adapter.update(record(json!({"name": "x"})));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_failed_update_leaves_row_untouched() {
        let adapter = users();
        adapter
            .insert(record(json!({"name": "Ana", "email": "a@x.io"})))
            .unwrap();
        let bo = adapter
            .insert(record(json!({"name": "Bo", "email": "b@x.io"})))
            .unwrap();

        let clash = adapter.update_by_id(bo.get("id").unwrap(), record(json!({"email": "A@X.IO"})));
        assert!(clash.is_err());
        assert_eq!(adapter.find_by_id(bo.get("id").unwrap()).unwrap(), Some(bo));
    }

    #[test]
    fn test_remove_by_id() {
        let adapter = users();
        let ana = adapter.insert(record(json!({"name": "Ana"}))).unwrap();
        let id = ana.get("id").unwrap().clone();

        assert_eq!(adapter.remove_by_id(&id).unwrap(), Some(ana));
        assert_eq!(adapter.remove_by_id(&id).unwrap(), None);
        assert_eq!(adapter.find_by_id(&id).unwrap(), None);
        let by_name = record(json!({"searchFields": ["name"], "search": "Ana"}));
        assert!(adapter.find(&by_name).unwrap().is_empty());
    }

    #[test]
    fn test_find_by_ids_keeps_slots_for_missing() {
        let adapter = users();
        let a = adapter.insert(record(json!({"name": "A"}))).unwrap();
        let b = adapter.insert(record(json!({"name": "B"}))).unwrap();

        let found = adapter
            .find_by_ids(&[
                a.get("id").unwrap().clone(),
                json!("missing"),
                b.get("id").unwrap().clone(),
            ])
            .unwrap();
        assert_eq!(found, vec![Some(a), None, Some(b)]);
    }

    #[test]
    fn test_remove_all() {
        let adapter = users();
        adapter.insert(record(json!({"name": "A"}))).unwrap();
        adapter.insert(record(json!({"name": "B"}))).unwrap();

        assert_eq!(adapter.remove_all().unwrap(), 2);
        assert_eq!(adapter.count(&Record::new()).unwrap(), 0);
        let by_name = record(json!({"searchFields": ["name"], "search": "A"}));
        assert!(adapter.find(&by_name).unwrap().is_empty());

        adapter.insert(record(json!({"name": "A"}))).unwrap();
        assert_eq!(adapter.find(&by_name).unwrap().len(), 1);
    }

    #[test]
    fn test_file_backed_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddedConfig::in_memory("notes").with_path(dir.path().join("notes.redb"));

        let adapter = EmbeddedAdapter::new(config.clone());
        adapter.connect().unwrap();
        let note = adapter.insert(record(json!({"text": "hello"}))).unwrap();
        adapter.disconnect().unwrap();

        let reopened = EmbeddedAdapter::new(config);
        reopened.connect().unwrap();
        assert_eq!(reopened.find_by_id(note.get("id").unwrap()).unwrap(), Some(note));
    }
}
