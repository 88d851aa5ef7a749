//! Translation between descriptors/records and BSON.
//!
//! The engine names its identifier `_id`; records name it `id`. Requests
//! that mention `id` are rewritten to `_id`, and a 24-digit hex string is
//! read as an `ObjectId` so callers can hand back the ids they were given.

use crate::models::{QueryDescriptor, Record, query};
use crate::{Error, Result};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc, to_bson};
use mongodb::options::FindOptions;
use serde_json::Value;

/// Engine identifier field.
pub const ENGINE_ID: &str = "_id";

fn encode_error(e: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("value cannot be stored as BSON: {e}"))
}

/// Maps a record field name to a document field name.
#[must_use]
pub fn field_name(field: &str) -> &str {
    if field == query::ID { ENGINE_ID } else { field }
}

/// Converts an identifier value, reading 24-digit hex strings as `ObjectId`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value has no BSON form.
pub fn id_to_bson(id: &Value) -> Result<Bson> {
    if let Some(oid) = id.as_str().and_then(|s| ObjectId::parse_str(s).ok()) {
        return Ok(Bson::ObjectId(oid));
    }
    to_bson(id).map_err(encode_error)
}

fn field_value(field: &str, value: &Value) -> Result<(String, Bson)> {
    let name = field_name(field);
    let bson = if name == ENGINE_ID {
        id_to_bson(value)?
    } else {
        to_bson(value).map_err(encode_error)?
    };
    Ok((name.to_string(), bson))
}

/// Equality clause for a search value.
///
/// Search values arrive as text. Text that is exactly how a number or
/// boolean is written also matches the typed value, so `"30"` finds both
/// `"30"` and `30`.
fn search_equality(field: &str, search: &str) -> Result<Document> {
    let (name, text) = field_value(field, &Value::String(search.to_string()))?;
    let typed = serde_json::from_str::<Value>(search)
        .ok()
        .filter(|value| (value.is_number() || value.is_boolean()) && value.to_string() == search);
    let bson = match typed {
        Some(value) if name != ENGINE_ID => {
            doc! { "$in": [text, to_bson(&value).map_err(encode_error)?] }.into()
        },
        _ => text,
    };
    let mut clause = Document::new();
    clause.insert(name, bson);
    Ok(clause)
}

/// Merges clauses into one document, or `$and`s them when fields repeat.
fn all_of(clauses: Vec<Document>) -> Document {
    let total: usize = clauses.iter().map(Document::len).sum();
    let mut merged = Document::new();
    for (name, bson) in clauses.iter().flatten() {
        merged.insert(name.clone(), bson.clone());
    }
    if merged.len() == total {
        merged
    } else {
        doc! { "$and": clauses }
    }
}

/// Builds the native filter for a descriptor.
///
/// `query` pairs form the base filter. One search field adds an equality
/// clause; several add an `$or` of equality clauses on the same value. A list
/// `search` adds one equality per field, AND'ed. The query and search parts
/// are AND'ed.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a value has no BSON form.
///
/// # Examples
///
/// ```
/// use omnistore::QueryDescriptor;
/// use omnistore::storage::document::build_filter;
/// use mongodb::bson::doc;
///
/// let descriptor = QueryDescriptor::new()
///     .with_query("status", "open")
///     .with_search("ana", ["owner", "reviewer"]);
/// assert_eq!(
///     build_filter(&descriptor)?,
///     doc! {"status": "open", "$or": [{"owner": "ana"}, {"reviewer": "ana"}]}
/// );
/// # Ok::<(), omnistore::Error>(())
/// ```
pub fn build_filter(descriptor: &QueryDescriptor) -> Result<Document> {
    let mut filter = Document::new();
    for (field, value) in descriptor.query.iter() {
        let (name, bson) = field_value(field, value)?;
        filter.insert(name, bson);
    }

    let search_clause = if let Some(pairs) = descriptor.composite_clause() {
        all_of(
            pairs
                .iter()
                .map(|(field, value)| search_equality(field, value))
                .collect::<Result<_>>()?,
        )
    } else if let Some((search, fields)) = descriptor.search_clause() {
        let clauses = fields
            .iter()
            .map(|field| search_equality(field, search))
            .collect::<Result<Vec<_>>>()?;
        match <[Document; 1]>::try_from(clauses) {
            Ok([single]) => single,
            Err(clauses) => doc! { "$or": clauses },
        }
    } else {
        return Ok(filter);
    };
    if search_clause.keys().any(|key| filter.contains_key(key)) {
        let mut combined = Document::new();
        combined.insert("$and", vec![filter, search_clause]);
        return Ok(combined);
    }
    for (name, bson) in search_clause {
        filter.insert(name, bson);
    }
    Ok(filter)
}

/// Builds cursor options: row cap, skip, sort and projection.
#[must_use]
#[allow(clippy::field_reassign_with_default)]
pub fn build_find_options(descriptor: &QueryDescriptor) -> FindOptions {
    let mut options = FindOptions::default();
    options.limit = descriptor
        .limit
        .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    options.skip = descriptor.offset;

    if !descriptor.sort.is_empty() {
        let mut sort = Document::new();
        for key in &descriptor.sort {
            sort.insert(field_name(&key.field), key.direction.as_i32());
        }
        options.sort = Some(sort);
    }

    if let Some(fields) = &descriptor.fields {
        let mut projection = Document::new();
        for field in fields {
            projection.insert(field_name(field), 1);
        }
        if !projection.contains_key(ENGINE_ID) {
            projection.insert(ENGINE_ID, 0);
        }
        options.projection = Some(projection);
    }
    options
}

/// Converts a record to a document for insertion. `id`, if set, becomes `_id`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a value has no BSON form.
pub fn record_to_document(record: &Record) -> Result<Document> {
    let mut document = Document::new();
    for (field, value) in record.iter() {
        let (name, bson) = field_value(field, value)?;
        document.insert(name, bson);
    }
    Ok(document)
}

/// Converts a BSON value to JSON, rendering object ids as hex strings.
#[must_use]
pub fn bson_to_value(bson: Bson) -> Value {
    match bson {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => other.into_relaxed_extjson(),
    }
}

/// Converts a stored document to a record. `_id` becomes `id`.
#[must_use]
pub fn document_to_record(document: Document) -> Record {
    let mut record = Record::new();
    for (field, bson) in document {
        let field = if field == ENGINE_ID { query::ID.to_string() } else { field };
        record.set(field, bson_to_value(bson));
    }
    record
}
