//! In-process evaluation of the non-index parts of a descriptor.
//!
//! The embedded store narrows candidates through its indexes and re-checks
//! them with [`matches_search`] or [`matches_all`]; `query`, `sort`, `offset`,
//! `limit` and `fields` are applied here with the same ordering rules the
//! document and relational backends use.

use crate::models::{QueryDescriptor, Record, SortDirection, SortKey, compare_values, values_match};
use serde_json::Value;
use std::cmp::Ordering;

/// True if every `query` pair matches the record.
pub(crate) fn matches_query(record: &Record, query: &Record) -> bool {
    query
        .iter()
        .all(|(field, wanted)| values_match(record.get(field), wanted))
}

/// True if any of `fields` equals `search`.
pub(crate) fn matches_search(record: &Record, search: &str, fields: &[String]) -> bool {
    let wanted = Value::String(search.to_string());
    fields
        .iter()
        .any(|field| values_match(record.get(field), &wanted))
}

/// True if every field equals its paired value.
pub(crate) fn matches_all(record: &Record, pairs: &[(&str, &str)]) -> bool {
    pairs
        .iter()
        .all(|(field, value)| values_match(record.get(field), &Value::String((*value).to_string())))
}

/// Stable multi-key sort. Earlier keys take precedence.
pub(crate) fn sort_records(records: &mut [Record], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ord = compare_values(a.get(&key.field), b.get(&key.field));
                match key.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Filters, sorts, paginates and projects candidate records.
pub(crate) fn apply(candidates: Vec<Record>, descriptor: &QueryDescriptor) -> Vec<Record> {
    let mut records: Vec<Record> = candidates
        .into_iter()
        .filter(|record| matches_query(record, &descriptor.query))
        .collect();

    sort_records(&mut records, &descriptor.sort);

    let offset = usize::try_from(descriptor.offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = descriptor
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

    records
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|record| match &descriptor.fields {
            Some(fields) => record.project(fields),
            None => record,
        })
        .collect()
}
