//! Result rows and typed value extraction.

use crate::error::{QueryError, QueryResult};
use crate::value::{Record, Value};
use chrono::{DateTime, Utc};

/// One result row: an ordered mapping from column name to [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from (column, value) pairs, preserving order.
    pub fn from_pairs<N, I>(pairs: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self { columns, values }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a positional index, if in range.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a named column; absence is a decode error.
    pub fn get(&self, column: &str) -> QueryResult<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
            .ok_or_else(|| QueryError::decode(column, "column absent from result set"))
    }

    /// Typed extraction of a named column.
    pub fn try_get<T: FromValue>(&self, column: &str) -> QueryResult<T> {
        let value = self.get(column)?;
        T::from_value(value).map_err(|message| QueryError::decode(column, message))
    }

    /// Consume the row into its values, in result order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Project a subset of columns into a [`Record`].
    pub fn project(&self, columns: &[&str]) -> QueryResult<Record> {
        let mut record = Record::new();
        for column in columns {
            record = record.set(*column, self.get(column)?.clone());
        }
        Ok(record)
    }
}

/// Conversion from a dynamically typed [`Value`] into a Rust type.
///
/// Implementations are strict about the variant they accept; a mismatch
/// surfaces as a [`QueryError::Decode`] carrying the column name.
pub trait FromValue: Sized {
    /// Convert, returning a human-readable mismatch message on failure.
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(n) => Ok(*n),
            other => Err(format!("expected integer, got {other:?}")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(n) => i32::try_from(*n).map_err(|_| format!("{n} out of range for i32")),
            other => Err(format!("expected integer, got {other:?}")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            other => Err(format!("expected float, got {other:?}")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(format!("expected boolean, got {other:?}")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(format!("expected text, got {other:?}")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(format!("expected binary, got {other:?}")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            other => Err(format!("expected timestamp, got {other:?}")),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            other => Err(format!("expected json, got {other:?}")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::from_pairs([
            ("id", Value::Int(7)),
            ("name", Value::Text("alice".to_string())),
            ("deleted_at", Value::Null),
        ])
    }

    #[test]
    fn test_get_by_name() {
        let row = sample();
        assert_eq!(row.get("id").unwrap(), &Value::Int(7));
        assert!(row.get("missing").unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn test_typed_extraction() {
        let row = sample();
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<String>("name").unwrap(), "alice");
        assert_eq!(row.try_get::<Option<i64>>("deleted_at").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let row = sample();
        let err = row.try_get::<bool>("name").unwrap_err();
        assert!(matches!(err, QueryError::Decode { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_project() {
        let row = sample();
        let rec = row.project(&["name", "id"]).unwrap();
        let cols: Vec<&str> = rec.columns().collect();
        assert_eq!(cols, vec!["name", "id"]);
    }
}
