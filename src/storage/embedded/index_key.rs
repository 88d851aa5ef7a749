//! Composite index keys for the embedded adapter.
//!
//! A key is the component strings joined with `-`, optionally lowercased,
//! followed by one NUL byte. The terminator keeps a key from being a byte
//! prefix of a longer key, so `"ab"` and `"ab-c"` never collide in a range
//! scan.

use crate::models::{Record, value_to_string};
use crate::{Error, Result};
use serde_json::Value;

/// Separator placed between key components and between index field names.
pub const KEY_SEPARATOR: &str = "-";

const KEY_TERMINATOR: u8 = 0;

/// Builds index keys from lookup arguments or from stored records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeyCodec {
    fields: Vec<String>,
    lowercase: bool,
}

impl IndexKeyCodec {
    /// Creates a codec over the given record fields.
    #[must_use]
    pub fn new<I, S>(fields: I, lowercase: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            lowercase,
        }
    }

    /// Fields this codec reads from a record.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Encodes lookup arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any argument is not a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use omnistore::IndexKeyCodec;
    /// use serde_json::json;
    ///
    /// let codec = IndexKeyCodec::new(["first", "last"], true);
    /// let key = codec.from_args(&[json!("Ana"), json!("Silva")])?;
    /// assert_eq!(key, b"ana-silva\0");
    /// # Ok::<(), omnistore::Error>(())
    /// ```
    pub fn from_args(&self, args: &[Value]) -> Result<Vec<u8>> {
        let parts = args
            .iter()
            .map(|arg| {
                arg.as_str().ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "index keys can only be built from strings, got {arg}"
                    ))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        Ok(self.encode(&parts.join(KEY_SEPARATOR)))
    }

    /// Encodes the indexed fields of a stored record.
    ///
    /// Non-string values are rendered as text. Returns `None` if any indexed
    /// field is missing or null.
    #[must_use]
    pub fn from_record(&self, record: &Record) -> Option<Vec<u8>> {
        let parts = self
            .fields
            .iter()
            .map(|field| match record.get(field) {
                None | Some(Value::Null) => None,
                Some(value) => Some(value_to_string(value)),
            })
            .collect::<Option<Vec<String>>>()?;
        Some(self.encode(&parts.join(KEY_SEPARATOR)))
    }

    fn encode(&self, joined: &str) -> Vec<u8> {
        let text = if self.lowercase {
            joined.to_lowercase()
        } else {
            joined.to_string()
        };
        let mut key = Vec::with_capacity(text.len() + 1);
        key.extend_from_slice(text.as_bytes());
        key.push(KEY_TERMINATOR);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(&["Ana"], false, b"Ana\0" ; "single component")]
    #[test_case(&["Ana", "Silva"], false, b"Ana-Silva\0" ; "joined with separator")]
    #[test_case(&["Ana", "Silva"], true, b"ana-silva\0" ; "lowercased")]
    #[test_case(&[], false, b"\0" ; "no components")]
    fn test_from_args(args: &[&str], lowercase: bool, expected: &[u8]) {
        let codec = IndexKeyCodec::new(["a", "b"], lowercase);
        let args: Vec<Value> = args.iter().map(|s| json!(s)).collect();
        assert_eq!(codec.from_args(&args).unwrap(), expected);
    }

    #[test]
    fn test_from_args_rejects_non_strings() {
        let codec = IndexKeyCodec::new(["age"], false);
        assert!(matches!(
            codec.from_args(&[json!(30)]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_record_matches_from_args() {
        let codec = IndexKeyCodec::new(["name", "age"], false);
        let record = Record::from_value(json!({"name": "Ana", "age": 30})).unwrap();
        assert_eq!(
            codec.from_record(&record).unwrap(),
            codec.from_args(&[json!("Ana-30")]).unwrap()
        );
    }

    #[test]
    fn test_from_record_missing_field() {
        let codec = IndexKeyCodec::new(["name", "email"], false);
        let record = Record::from_value(json!({"name": "Ana", "email": null})).unwrap();
        assert!(codec.from_record(&record).is_none());
    }

    #[test]
    fn test_terminator_prevents_prefix_match() {
        let codec = IndexKeyCodec::new(["a"], false);
        let short = codec.from_args(&[json!("ab")]).unwrap();
        let long = codec.from_args(&[json!("ab"), json!("c")]).unwrap();
        assert!(!long.starts_with(&short));
    }
}
