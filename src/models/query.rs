//! Query descriptor parsing.
//!
//! Extracts the backend-independent request fields from a [`Record`]:
//!
//! - `search` / `searchFields` - equality search, OR across the listed fields;
//!   a list `search` gives one value per field, AND'ed (composite match)
//! - `query` - equality filter, AND across its entries
//! - `sort` - `"name -age"` or `["name", "-age"]`, `-` prefix means descending
//! - `limit` / `offset` - pagination
//! - `fields` - projection
//!
//! Each adapter re-expresses the parsed descriptor natively; the parser
//! itself does no I/O.

use super::record::{Record, value_to_string};
use crate::{Error, Result};
use serde_json::Value;

/// Request field holding the search value.
pub const SEARCH: &str = "search";
/// Request field listing the fields compared against `search`.
pub const SEARCH_FIELDS: &str = "searchFields";
/// Request field holding the equality filter.
pub const QUERY: &str = "query";
/// Request field holding the sort specification.
pub const SORT: &str = "sort";
/// Request field holding the row cap.
pub const LIMIT: &str = "limit";
/// Request field holding the number of rows to skip.
pub const OFFSET: &str = "offset";
/// Request field listing the fields to return.
pub const FIELDS: &str = "fields";
/// Request field holding a single identifier.
pub const ID: &str = "id";
/// Request field holding a list of identifiers.
pub const IDS: &str = "ids";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    /// Document-store sort value for this direction (`1` or `-1`).
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// One sort key: a field and its direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Field name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Parses a single sort token. A leading `-` means descending.
    ///
    /// Returns `None` for an empty token or a bare `-`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = token
            .strip_prefix('-')
            .map_or((token, SortDirection::Ascending), |rest| {
                (rest, SortDirection::Descending)
            });
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }

    /// Ascending key on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending key on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Parsed form of a request's filter, search, sort and pagination fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// Value compared against every field in `search_fields`.
    pub search: Option<String>,
    /// Values matched one-to-one against `search_fields`, AND'ed together.
    /// Set when `search` is a list.
    pub search_terms: Vec<String>,
    /// Fields compared against `search` (OR'ed) or `search_terms` (AND'ed).
    pub search_fields: Vec<String>,
    /// Equality filter, AND'ed together.
    pub query: Record,
    /// Sort keys, first is the primary key.
    pub sort: Vec<SortKey>,
    /// Maximum number of rows to return.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
    /// Fields to return. `None` means the backend default.
    pub fields: Option<Vec<String>>,
}

impl QueryDescriptor {
    /// Creates an empty descriptor (match everything, no ordering).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a descriptor from a request record.
    ///
    /// No field is required. An empty sort specification is logged and
    /// treated as "no sort".
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `query` is not an object, if
    /// `limit`/`offset` are not non-negative integers, or if a list `search`
    /// does not have one value per search field.
    ///
    /// # Examples
    ///
    /// ```
    /// use omnistore::{QueryDescriptor, Record, SortKey};
    /// use serde_json::json;
    ///
    /// let params = Record::from_value(json!({
    ///     "searchFields": ["name", "email"],
    ///     "search": "ana",
    ///     "sort": "name -age",
    ///     "limit": 10,
    /// }))?;
    /// let descriptor = QueryDescriptor::parse(&params)?;
    /// assert_eq!(descriptor.sort, vec![SortKey::asc("name"), SortKey::desc("age")]);
    /// assert_eq!(descriptor.limit, Some(10));
    /// # Ok::<(), omnistore::Error>(())
    /// ```
    pub fn parse(params: &Record) -> Result<Self> {
        let (search, search_terms) = match params.get(SEARCH) {
            None | Some(Value::Null) => (None, Vec::new()),
            Some(Value::Array(items)) => (None, items.iter().map(value_to_string).collect()),
            Some(value) => (Some(value_to_string(value)), Vec::new()),
        };
        let search_fields = params.get_string_list(SEARCH_FIELDS).unwrap_or_default();
        if !search_terms.is_empty()
            && !search_fields.is_empty()
            && search_terms.len() != search_fields.len()
        {
            return Err(Error::InvalidInput(format!(
                "`search` lists {} values for {} `searchFields`",
                search_terms.len(),
                search_fields.len()
            )));
        }

        let query = match params.get(QUERY) {
            None | Some(Value::Null) => Record::new(),
            Some(Value::Object(map)) => Record::from(map.clone()),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "`query` must be an object of field/value pairs".to_string(),
                ));
            },
        };

        Ok(Self {
            search,
            search_terms,
            search_fields,
            query,
            sort: parse_sort(params.get(SORT)),
            limit: parse_count(params, LIMIT)?,
            offset: parse_count(params, OFFSET)?,
            fields: params.get_string_list(FIELDS),
        })
    }

    /// Returns the search value and fields when both are present.
    ///
    /// A `search` with no `searchFields` (or the reverse) has no effect.
    #[must_use]
    pub fn search_clause(&self) -> Option<(&str, &[String])> {
        match &self.search {
            Some(search) if !self.search_fields.is_empty() => {
                Some((search.as_str(), self.search_fields.as_slice()))
            },
            _ => None,
        }
    }

    /// Returns `(field, value)` pairs for a composite match, when `search`
    /// was a list with one value per search field.
    #[must_use]
    pub fn composite_clause(&self) -> Option<Vec<(&str, &str)>> {
        if self.search_terms.is_empty() || self.search_terms.len() != self.search_fields.len() {
            return None;
        }
        Some(
            self.search_fields
                .iter()
                .map(String::as_str)
                .zip(self.search_terms.iter().map(String::as_str))
                .collect(),
        )
    }

    /// Sets a composite match: each field must equal its value.
    #[must_use]
    pub fn with_composite_search<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.search = None;
        (self.search_fields, self.search_terms) = pairs
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .unzip();
        self
    }

    /// Sets the search value and fields.
    #[must_use]
    pub fn with_search<I, S>(mut self, search: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = Some(search.into());
        self.search_terms.clear();
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn with_query(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.set(field, value);
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Sets the row cap.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restricts the returned fields.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Renders the descriptor back into request form.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut params = Record::new();
        if let Some(search) = &self.search {
            params.set(SEARCH, search.clone());
        } else if !self.search_terms.is_empty() {
            params.set(SEARCH, self.search_terms.clone());
        }
        if !self.search_fields.is_empty() {
            params.set(SEARCH_FIELDS, self.search_fields.clone());
        }
        if !self.query.is_empty() {
            params.set(QUERY, Value::from(self.query.clone()));
        }
        if !self.sort.is_empty() {
            let sort: Vec<String> = self
                .sort
                .iter()
                .map(|key| match key.direction {
                    SortDirection::Ascending => key.field.clone(),
                    SortDirection::Descending => format!("-{}", key.field),
                })
                .collect();
            params.set(SORT, sort);
        }
        if let Some(limit) = self.limit {
            params.set(LIMIT, limit);
        }
        if let Some(offset) = self.offset {
            params.set(OFFSET, offset);
        }
        if let Some(fields) = &self.fields {
            params.set(FIELDS, fields.clone());
        }
        params
    }
}

/// Parses a sort specification (string or list of strings).
fn parse_sort(value: Option<&Value>) -> Vec<SortKey> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let key = SortKey::parse(&value_to_string(item));
                if key.is_none() {
                    tracing::warn!(entry = %item, "ignoring invalid sort entry");
                }
                key
            })
            .collect(),
        Some(other) => {
            let text = value_to_string(other);
            let keys: Vec<SortKey> = text.split_whitespace().filter_map(SortKey::parse).collect();
            if keys.is_empty() {
                tracing::warn!(sort = %text, "invalid sort entry, no sort applied");
            }
            keys
        },
    }
}

/// Parses a non-negative integer request field.
fn parse_count(params: &Record, field: &str) -> Result<Option<u64>> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => params.get_u64(field).map(Some).ok_or_else(|| {
            Error::InvalidInput(format!("`{field}` must be a non-negative integer"))
        }),
    }
}

/// Reads the `id` field of a request.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the field is absent or null.
pub fn extract_id(params: &Record) -> Result<Value> {
    match params.get(ID) {
        None | Some(Value::Null) => Err(Error::InvalidInput(
            "request has no `id` field".to_string(),
        )),
        Some(id) => Ok(id.clone()),
    }
}

/// Reads the `ids` field of a request. A scalar is treated as a one-item list.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the field is absent or null.
pub fn extract_ids(params: &Record) -> Result<Vec<Value>> {
    match params.get(IDS) {
        None | Some(Value::Null) => Err(Error::InvalidInput(
            "request has no `ids` field".to_string(),
        )),
        Some(Value::Array(ids)) => Ok(ids.clone()),
        Some(id) => Ok(vec![id.clone()]),
    }
}
