//! SQL construction for the relational adapter.
//!
//! Statements are assembled from a [`Schema`] built once from the adapter
//! configuration:
//! - identifiers come only from the configured column list and are
//!   double-quoted, so request field names never reach SQL text unchecked
//! - every value is a bound `?` parameter, coerced by the declared column type
//! - `query` pairs are AND'ed; `searchFields` compare the same `search` value
//!   and are OR'ed; the two groups are AND'ed

use super::{Column, ColumnNames, ColumnType};
use crate::models::{QueryDescriptor, Record, SortDirection, value_as_i64, value_to_string};
use crate::{Error, Result};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

/// A statement and its positional parameters.
pub(crate) type Statement = (String, Vec<SqlValue>);

/// Quotes an identifier for `SQLite`.
#[must_use]
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A column as the adapter sees it: record field, SQL identifier and type.
#[derive(Debug, Clone)]
pub(crate) struct SchemaColumn {
    pub(crate) field: String,
    pub(crate) ident: String,
    pub(crate) column_type: Option<ColumnType>,
}

/// Resolved table layout.
#[derive(Debug, Clone)]
pub(crate) struct Schema {
    table: String,
    id: SchemaColumn,
    columns: Vec<SchemaColumn>,
    default_fields: Vec<String>,
}

impl Schema {
    /// Resolves identifiers and the default projection.
    ///
    /// `fields` empty means every column plus the identifier.
    pub(crate) fn new(
        table: &str,
        id_field: &str,
        columns: &[Column],
        fields: &[String],
        names: &ColumnNames,
    ) -> Self {
        let columns: Vec<SchemaColumn> = columns
            .iter()
            .map(|c| SchemaColumn {
                field: c.name.clone(),
                ident: quote_ident(&names.translate(&c.name)),
                column_type: c.column_type.clone(),
            })
            .collect();
        let mut default_fields = if fields.is_empty() {
            columns.iter().map(|c| c.field.clone()).collect()
        } else {
            fields.to_vec()
        };
        if !default_fields.iter().any(|f| f == id_field) {
            default_fields.push(id_field.to_string());
        }
        Self {
            table: quote_ident(table),
            id: SchemaColumn {
                field: id_field.to_string(),
                ident: quote_ident(&names.translate(id_field)),
                column_type: Some(ColumnType::Integer),
            },
            columns,
            default_fields,
        }
    }

    /// Record field holding the identifier.
    pub(crate) fn id_field(&self) -> &str {
        &self.id.field
    }

    /// Looks up a record field. The wire name `id` always means the identifier.
    pub(crate) fn column(&self, field: &str) -> Result<&SchemaColumn> {
        if field == self.id.field || field == crate::models::query::ID {
            return Ok(&self.id);
        }
        self.columns
            .iter()
            .find(|c| c.field == field)
            .ok_or_else(|| Error::InvalidInput(format!("unknown column '{field}'")))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the configured columns.
    pub(crate) fn create_table(&self) -> Result<String> {
        let mut definitions = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.id.ident)];
        for column in &self.columns {
            match &column.column_type {
                Some(ty) => definitions.push(format!("{} {}", column.ident, ty.declaration()?)),
                None => definitions.push(column.ident.clone()),
            }
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            definitions.join(", ")
        ))
    }

    /// `WHERE` clause (without the keyword) for a descriptor.
    pub(crate) fn where_clause(&self, descriptor: &QueryDescriptor) -> Result<Option<Statement>> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (field, value) in descriptor.query.iter() {
            let column = self.column(field)?;
            if value.is_null() {
                clauses.push(format!("{} IS NULL", column.ident));
            } else {
                clauses.push(format!("{} = ?", column.ident));
                params.push(bind(value, column.column_type.as_ref())?);
            }
        }

        if let Some(pairs) = descriptor.composite_clause() {
            for (field, value) in pairs {
                let column = self.column(field)?;
                clauses.push(format!("{} = ?", column.ident));
                params.push(bind_search(value, column.column_type.as_ref()));
            }
        } else if let Some((search, fields)) = descriptor.search_clause() {
            let mut group = Vec::with_capacity(fields.len());
            for field in fields {
                let column = self.column(field)?;
                group.push(format!("{} = ?", column.ident));
                params.push(bind_search(search, column.column_type.as_ref()));
            }
            clauses.push(format!("({})", group.join(" OR ")));
        }

        if clauses.is_empty() {
            return Ok(None);
        }
        Ok(Some((clauses.join(" AND "), params)))
    }

    /// `SELECT` for a descriptor, with the columns it projects.
    pub(crate) fn select(&self, descriptor: &QueryDescriptor) -> Result<(Statement, Vec<SchemaColumn>)> {
        let fields = descriptor.fields.as_ref().unwrap_or(&self.default_fields);
        let projected = fields
            .iter()
            .map(|field| {
                self.column(field).map(|c| SchemaColumn {
                    field: field.clone(),
                    ..c.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if projected.is_empty() {
            return Err(Error::InvalidInput("`fields` must name at least one column".to_string()));
        }

        let select_list: Vec<&str> = projected.iter().map(|c| c.ident.as_str()).collect();
        let mut sql = format!("SELECT {} FROM {}", select_list.join(", "), self.table);
        let mut params = Vec::new();

        if let Some((clause, where_params)) = self.where_clause(descriptor)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params.extend(where_params);
        }

        if !descriptor.sort.is_empty() {
            let order = descriptor
                .sort
                .iter()
                .map(|key| {
                    self.column(&key.field)
                        .map(|c| format!("{} {}", c.ident, key.direction.as_sql()))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (descriptor.limit, descriptor.offset) {
            (None, None) => {},
            (limit, offset) => {
                sql.push_str(" LIMIT ?");
                params.push(limit.map_or(SqlValue::Integer(-1), to_sql_integer));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ?");
                    params.push(to_sql_integer(offset));
                }
            },
        }

        Ok(((sql, params), projected))
    }

    /// `SELECT COUNT(*)` with the same filter as [`Self::select`].
    pub(crate) fn count(&self, descriptor: &QueryDescriptor) -> Result<Statement> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let mut params = Vec::new();
        if let Some((clause, where_params)) = self.where_clause(descriptor)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params = where_params;
        }
        Ok((sql, params))
    }

    /// `INSERT` for a record. The identifier, if present, is ignored.
    pub(crate) fn insert(&self, record: &Record) -> Result<Statement> {
        let mut idents = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.iter() {
            let column = self.column(field)?;
            if column.ident == self.id.ident {
                continue;
            }
            idents.push(column.ident.as_str());
            params.push(bind(value, column.column_type.as_ref())?);
        }
        if idents.is_empty() {
            return Ok((format!("INSERT INTO {} DEFAULT VALUES", self.table), params));
        }
        let placeholders = vec!["?"; idents.len()].join(", ");
        Ok((
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                self.table,
                idents.join(", ")
            ),
            params,
        ))
    }

    /// `UPDATE ... WHERE id = ?`. Returns `None` when there is nothing to set.
    pub(crate) fn update(&self, id: &Value, changes: &Record) -> Result<Option<Statement>> {
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in changes.iter() {
            let column = self.column(field)?;
            if column.ident == self.id.ident {
                continue;
            }
            assignments.push(format!("{} = ?", column.ident));
            params.push(bind(value, column.column_type.as_ref())?);
        }
        if assignments.is_empty() {
            return Ok(None);
        }
        params.push(self.bind_id(id)?);
        Ok(Some((
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                self.table,
                assignments.join(", "),
                self.id.ident
            ),
            params,
        )))
    }

    /// `DELETE ... WHERE id = ?`.
    pub(crate) fn delete_by_id(&self, id: &Value) -> Result<Statement> {
        Ok((
            format!("DELETE FROM {} WHERE {} = ?", self.table, self.id.ident),
            vec![self.bind_id(id)?],
        ))
    }

    /// `DELETE` of every row.
    pub(crate) fn delete_all(&self) -> String {
        format!("DELETE FROM {}", self.table)
    }

    fn bind_id(&self, id: &Value) -> Result<SqlValue> {
        bind(id, self.id.column_type.as_ref())
    }
}

fn to_sql_integer(n: u64) -> SqlValue {
    SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn type_error(value: &Value, ty: &ColumnType) -> Error {
    Error::InvalidInput(format!("value {value} does not fit a {} column", ty.name()))
}

/// Coerces a request value to the parameter type of a column.
pub(crate) fn bind(value: &Value, ty: Option<&ColumnType>) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    match ty {
        Some(ColumnType::Text) => Ok(SqlValue::Text(value_to_string(value))),
        Some(ty @ ColumnType::Integer) => match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|_| type_error(value, ty)),
            other => value_as_i64(other)
                .map(SqlValue::Integer)
                .ok_or_else(|| type_error(value, ty)),
        },
        Some(ty @ ColumnType::Number) => match value {
            Value::Number(n) => n.as_f64().map(SqlValue::Real).ok_or_else(|| type_error(value, ty)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(SqlValue::Real)
                .map_err(|_| type_error(value, ty)),
            Value::Bool(b) => Ok(SqlValue::Real(f64::from(u8::from(*b)))),
            _ => Err(type_error(value, ty)),
        },
        Some(ColumnType::Other(_)) | None => Ok(bind_dynamic(value)),
    }
}

fn bind_dynamic(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or_else(|| SqlValue::Text(n.to_string())),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Coerces the search text to a column's type, falling back to text so a
/// mismatched value simply matches nothing.
fn bind_search(search: &str, ty: Option<&ColumnType>) -> SqlValue {
    let text = || SqlValue::Text(search.to_string());
    match ty {
        Some(ColumnType::Integer) => search.trim().parse().map_or_else(|_| text(), SqlValue::Integer),
        Some(ColumnType::Number) => search.trim().parse().map_or_else(|_| text(), SqlValue::Real),
        _ => text(),
    }
}

/// Decodes a result row by declared column type.
pub(crate) fn decode_row(row: &Row<'_>, columns: &[SchemaColumn]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, column) in columns.iter().enumerate() {
        let value = decode_value(row.get_ref(i)?, column.column_type.as_ref());
        record.set(column.field.clone(), value);
    }
    Ok(record)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn decode_value(raw: ValueRef<'_>, ty: Option<&ColumnType>) -> Value {
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    match (raw, ty) {
        (ValueRef::Null, _) => Value::Null,

        (ValueRef::Integer(i), Some(ColumnType::Number)) => Value::from(i as f64),
        (ValueRef::Real(f), Some(ColumnType::Number)) => Value::from(f),
        (ValueRef::Text(t), Some(ColumnType::Number)) => {
            text(t).trim().parse::<f64>().map_or(Value::Null, Value::from)
        },

        (ValueRef::Integer(i), Some(ColumnType::Integer)) => Value::from(i),
        (ValueRef::Real(f), Some(ColumnType::Integer)) => Value::from(f as i64),
        (ValueRef::Text(t), Some(ColumnType::Integer)) => {
            text(t).trim().parse::<i64>().map_or(Value::Null, Value::from)
        },

        (ValueRef::Integer(i), Some(ColumnType::Text)) => Value::String(i.to_string()),
        (ValueRef::Real(f), Some(ColumnType::Text)) => Value::String(f.to_string()),

        (ValueRef::Integer(i), _) => Value::from(i),
        (ValueRef::Real(f), _) => Value::from(f),
        (ValueRef::Text(t) | ValueRef::Blob(t), _) => Value::String(text(t)),
    }
}
