//! Dynamically shaped records exchanged between callers and adapters.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// An ordered mapping from field name to JSON value.
///
/// Adapters depend only on this capability surface (get, set, iterate,
/// coerce), never on how the caller encoded the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a record from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidInput(format!(
                "record must be an object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style [`Record::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Removes a field, keeping the order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    /// Returns true if the field is present (even when null).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterates over field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays every field of `other` onto this record.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a copy holding only the named fields, in the requested order.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Self {
        let mut projected = Map::with_capacity(fields.len());
        for field in fields {
            if let Some(value) = self.0.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }
        Self(projected)
    }

    /// Borrows the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Field rendered as text. Null and absent fields yield `None`.
    #[must_use]
    pub fn get_string(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::Null => None,
            value => Some(value_to_string(value)),
        }
    }

    /// Field as a float, accepting numbers and numeric strings.
    #[must_use]
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Field as a signed integer, accepting integral numbers and numeric strings.
    #[must_use]
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(value_as_i64)
    }

    /// Field as an unsigned integer.
    #[must_use]
    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.get_i64(field).and_then(|n| u64::try_from(n).ok())
    }

    /// Field as a boolean.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Field as a list of values.
    #[must_use]
    pub fn get_list(&self, field: &str) -> Option<&Vec<Value>> {
        self.get(field)?.as_array()
    }

    /// Field as a list of strings.
    ///
    /// Accepts an array (each element rendered as text) or a single
    /// whitespace-separated string.
    #[must_use]
    pub fn get_string_list(&self, field: &str) -> Option<Vec<String>> {
        match self.get(field)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(value_to_string)
                    .collect(),
            ),
            Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
            Value::Null => None,
            other => Some(vec![value_to_string(other)]),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Object(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Renders a value as text: strings unquoted, everything else as JSON.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Integer view of a value, accepting integral floats and numeric strings.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rank of a JSON type in the cross-type sort order.
const fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values.
///
/// Missing and null sort first, then numbers (numerically), strings
/// (bytewise), objects, arrays and booleans. This is the order the document
/// engine applies across types, and for null/number/text columns it agrees
/// with the relational engine.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(Some(l), Some(r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        },
        (Some(Value::Object(x)), Some(Value::Object(y))) => serde_json::to_string(x)
            .unwrap_or_default()
            .cmp(&serde_json::to_string(y).unwrap_or_default()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality used by equality filters.
///
/// Numbers compare numerically; a string compared with a number or boolean
/// compares by text form. Everything else is structural equality.
#[must_use]
pub fn values_match(stored: Option<&Value>, wanted: &Value) -> bool {
    match (stored, wanted) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(Value::String(a)), Value::Number(_) | Value::Bool(_)) => *a == wanted.to_string(),
        (Some(stored @ (Value::Number(_) | Value::Bool(_))), Value::String(b)) => {
            stored.to_string() == *b
        },
        (Some(a), b) => a == b,
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
