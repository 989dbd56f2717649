//! Engine-facing traits: connections, prepared statements, and row cursors.
//!
//! Drivers implement these; the query and schema layers only ever talk to the traits.
//! Lifetimes tie a statement to its connection and a cursor to its statement, so a
//! statement cannot outlive the connection that compiled it and a statement cannot be
//! stepped from two places at once.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Lifecycle of a prepared statement.
///
/// ```text
/// Unbound --bind--> Bound --query/execute--> Row --> Done
///                     ^                        |       |
///                     +--------- rewind -------+-------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// At least one parameter slot has no value
    Unbound,
    /// Every slot is bound and the statement has not been stepped since the last reset
    Bound,
    /// Stepping produced a row; more may follow
    Row,
    /// Stepping reached completion
    Done,
}

impl StatementState {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatementState::Unbound => "unbound",
            StatementState::Bound => "bound",
            StatementState::Row => "row",
            StatementState::Done => "done",
        }
    }
}

/// An open database handle.
pub trait Connection {
    type Statement<'c>: PreparedStatement
    where
        Self: 'c;

    /// Compile `sql`. Invalid SQL is a prepare error.
    fn prepare<'c>(&'c self, sql: &str) -> Result<Self::Statement<'c>>;

    /// Run one or more statements that take no parameters and return no rows.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Row id of the most recent successful INSERT on this connection.
    fn last_insert_rowid(&self) -> i64;

    /// Largest number of parameters one statement may bind.
    fn max_bind_parameters(&self) -> usize;

    /// Whether no transaction is open.
    fn is_autocommit(&self) -> bool;
}

/// A compiled statement with positional (`?`) parameters.
pub trait PreparedStatement {
    type Cursor<'s>: RowCursor
    where
        Self: 's;

    fn sql(&self) -> &str;

    /// Number of parameter slots.
    fn parameter_count(&self) -> usize;

    /// Number of result columns.
    fn column_count(&self) -> usize;

    fn state(&self) -> StatementState;

    /// Bind `values` to slots 1..=n in order, expanding arrays into consecutive slots.
    ///
    /// The expanded count must equal [`parameter_count`](Self::parameter_count).
    /// Binding resets any step state.
    fn bind(&mut self, values: &[Value]) -> Result<()>;

    /// Start stepping. Requires the `Bound` state.
    fn query(&mut self) -> Result<Self::Cursor<'_>>;

    /// Step a statement to completion and return the number of changed rows.
    /// Requires the `Bound` state.
    fn execute(&mut self) -> Result<usize>;

    /// Clear step state, and with `clear_bindings` every bound value as well.
    fn reset(&mut self, clear_bindings: bool) -> Result<()>;

    /// Clear step state only, keeping bindings, so the statement can run again.
    fn rewind(&mut self) -> Result<()> {
        self.reset(false)
    }
}

/// Forward-only access to the rows a statement produces.
pub trait RowCursor {
    /// Step once. `None` means the statement completed.
    fn step(&mut self) -> Result<Option<Row>>;
}

/// Flatten `values` into one value per parameter slot.
pub fn expand_bindings(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.iter().map(Value::parameter_width).sum());
    for value in values {
        value.clone().flatten_into(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_bindings() {
        let values = [
            Value::BigInt(1),
            Value::Array(vec![Value::from("a"), Value::from("b")]),
            Value::Array(vec![]),
            Value::Null,
        ];
        let expanded = expand_bindings(&values);
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[2], Value::Text("b".to_string()));
        assert_eq!(expanded[3], Value::Null);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(StatementState::Done.as_str(), "done");
        assert_ne!(StatementState::Bound, StatementState::Unbound);
    }
}
