//! Materialized result rows.

use std::sync::Arc;

use crate::error::{Error, InternalErrorKind, Result};
use crate::types::FieldType;
use crate::value::Value;

/// One result row, read out of the engine before the statement is stepped again.
///
/// Column names are shared between all rows of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from shared column names and the values read for them.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Number of result columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Result column names, as reported by the engine.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Raw value of column `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Raw value of the first column with the given name.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    /// Whether column `index` holds NULL. Out-of-range columns count as NULL.
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(Value::is_null)
    }

    /// Read column `index` as `T`.
    pub fn get_as<T: FieldType>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::internal(
                InternalErrorKind::LayoutMismatch,
                format!(
                    "column {index} out of range for a row of {} columns",
                    self.values.len()
                ),
            )
        })?;
        T::from_value(value).map_err(|e| e.at_column(index))
    }

    /// Whether every column in `start..start + width` is NULL.
    pub fn all_null(&self, start: usize, width: usize) -> bool {
        (start..start + width).all(|i| self.is_null(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string(), "gpa".to_string()].into();
        Row::new(
            columns,
            vec![Value::BigInt(1), Value::Text("Ann".to_string()), Value::Null],
        )
    }

    #[test]
    fn test_typed_access() {
        let row = row();
        assert_eq!(row.get_as::<i64>(0).unwrap(), 1);
        assert_eq!(row.get_as::<String>(1).unwrap(), "Ann");
        assert_eq!(row.get_as::<Option<f64>>(2).unwrap(), None);
        assert_eq!(row.get_named("name"), Some(&Value::Text("Ann".to_string())));
    }

    #[test]
    fn test_null_into_required_reports_column() {
        let err = row().get_as::<f64>(2).unwrap_err();
        match err {
            Error::Type(e) => assert_eq!(e.column, Some(2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range() {
        let err = row().get_as::<i64>(7).unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::LayoutMismatch));
        assert!(row().is_null(7));
        assert!(row().all_null(2, 1));
        assert!(!row().all_null(1, 2));
    }
}
