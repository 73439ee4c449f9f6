//! Bound parameter values and ordered row mappings.

use crate::error::{QueryError, QueryResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tagged SQL parameter value.
///
/// Every literal handed to the builder is captured as one of these
/// variants and travels through the parameter ledger; nothing is ever
/// interpolated into the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical JSON text of this value, used when binding containment
    /// predicates. Strings are passed through untouched.
    pub(crate) fn to_json_text(&self) -> QueryResult<String> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Ok("null".to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(|n| n.to_string())
                .ok_or_else(|| {
                    QueryError::Serialization("non-finite float is not valid JSON".to_string())
                }),
            Value::Json(v) => Ok(serde_json::to_string(v)?),
            Value::Timestamp(ts) => Ok(serde_json::to_string(&ts.to_rfc3339())?),
            Value::Blob(_) => Err(QueryError::Serialization(
                "binary values cannot be bound as JSON".to_string(),
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// An insertion-ordered column → value mapping.
///
/// Used for insert rows, update sets and the condition half of
/// `update_or_insert`. Setting a column twice overwrites the earlier
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, preserving first-set ordering.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        self
    }

    /// Get a column's value, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// (column, value) pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record holds no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another record into this one; `other`'s values win on
    /// overlapping columns.
    pub fn merge(mut self, other: Record) -> Self {
        for (column, value) in other.entries {
            self = self.set(column, value);
        }
        self
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record = record.set(column, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn test_json_text_passthrough_for_strings() {
        let v = Value::from("already text");
        assert_eq!(v.to_json_text().unwrap(), "already text");
    }

    #[test]
    fn test_json_text_serializes_documents() {
        let v = Value::from(serde_json::json!({"a": [1, 2]}));
        assert_eq!(v.to_json_text().unwrap(), r#"{"a":[1,2]}"#);
        assert_eq!(Value::from(5i64).to_json_text().unwrap(), "5");
        assert_eq!(Value::from(true).to_json_text().unwrap(), "true");
    }

    #[test]
    fn test_record_preserves_order_and_overwrites() {
        let rec = Record::new()
            .set("name", "alice")
            .set("age", 30i64)
            .set("name", "bob");
        let cols: Vec<&str> = rec.columns().collect();
        assert_eq!(cols, vec!["name", "age"]);
        assert_eq!(rec.get("name"), Some(&Value::Text("bob".to_string())));
    }

    #[test]
    fn test_record_merge() {
        let base = Record::new().set("a", 1i64).set("b", 2i64);
        let merged = base.merge(Record::new().set("b", 9i64).set("c", 3i64));
        let cols: Vec<&str> = merged.columns().collect();
        assert_eq!(cols, vec!["a", "b", "c"]);
        assert_eq!(merged.get("b"), Some(&Value::Int(9)));
    }
}
