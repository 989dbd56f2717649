//! Prepared statements and row cursors over the engine.

use std::sync::Arc;

use litemodel_core::{
    Error, InternalErrorKind, PreparedStatement, Result, Row, RowCursor, StatementState, Value,
    expand_bindings,
};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{Phase, query_error};

/// A compiled statement borrowed from its connection.
///
/// Finalized on drop; a finalize failure is logged.
pub struct SqliteStatement<'c> {
    inner: Option<rusqlite::Statement<'c>>,
    sql: String,
    parameter_count: usize,
    columns: Arc<[String]>,
    state: StatementState,
}

impl<'c> SqliteStatement<'c> {
    pub(crate) fn new(inner: rusqlite::Statement<'c>, sql: &str) -> Self {
        let parameter_count = inner.parameter_count();
        let columns: Arc<[String]> = inner
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let state = if parameter_count == 0 {
            StatementState::Bound
        } else {
            StatementState::Unbound
        };
        Self {
            inner: Some(inner),
            sql: sql.to_string(),
            parameter_count,
            columns,
            state,
        }
    }

    /// Result column names.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn stmt<'a>(
        inner: &'a mut Option<rusqlite::Statement<'c>>,
    ) -> Result<&'a mut rusqlite::Statement<'c>> {
        inner.as_mut().ok_or_else(|| {
            Error::internal(
                InternalErrorKind::StatementCompleted,
                "statement has been finalized",
            )
        })
    }

    /// Fail unless every slot is bound and the statement is not mid-run.
    fn check_ready(&self) -> Result<()> {
        match self.state {
            StatementState::Bound => Ok(()),
            StatementState::Unbound => Err(Error::internal(
                InternalErrorKind::BindingMismatch,
                format!(
                    "statement has {} parameter slots that are not bound: {}",
                    self.parameter_count, self.sql
                ),
            )),
            StatementState::Row | StatementState::Done => Err(Error::internal(
                InternalErrorKind::StatementCompleted,
                format!(
                    "statement is {}; rewind or reset it before running again: {}",
                    self.state.as_str(),
                    self.sql
                ),
            )),
        }
    }
}

fn engine_value(value: Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(b)),
        Value::BigInt(v) => SqlValue::Integer(v),
        Value::Double(v) => SqlValue::Real(v),
        Value::Text(s) => SqlValue::Text(s),
        Value::Bytes(b) => SqlValue::Blob(b),
        Value::Array(_) => {
            return Err(Error::internal(
                InternalErrorKind::BindingMismatch,
                "nested collection left after expansion",
            ));
        }
    })
}

pub(crate) fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(r) => Value::Double(r),
        // Invalid UTF-8 stays as bytes so reading it as a string is a type error.
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => Value::Bytes(t.to_vec()),
        },
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl<'c> PreparedStatement for SqliteStatement<'c> {
    type Cursor<'s>
        = SqliteRows<'s>
    where
        Self: 's;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn state(&self) -> StatementState {
        self.state
    }

    fn bind(&mut self, values: &[Value]) -> Result<()> {
        // A failed bind leaves the statement unbound, whatever it held before.
        self.state = StatementState::Unbound;
        let expanded = expand_bindings(values);
        if expanded.len() != self.parameter_count {
            return Err(Error::internal(
                InternalErrorKind::BindingMismatch,
                format!(
                    "expected {} bound values, got {}: {}",
                    self.parameter_count,
                    expanded.len(),
                    self.sql
                ),
            ));
        }

        let stmt = Self::stmt(&mut self.inner)?;
        for (i, value) in expanded.into_iter().enumerate() {
            tracing::trace!(slot = i + 1, value = ?value, "Binding parameter");
            stmt.raw_bind_parameter(i + 1, engine_value(value)?)
                .map_err(|e| query_error(e, &self.sql, Phase::Execute))?;
        }
        self.state = StatementState::Bound;
        Ok(())
    }

    fn query(&mut self) -> Result<SqliteRows<'_>> {
        self.check_ready()?;
        let Self {
            inner,
            sql,
            columns,
            state,
            ..
        } = self;
        let stmt = Self::stmt(inner)?;
        *state = StatementState::Row;
        tracing::trace!(sql = %sql, "Stepping query");
        Ok(SqliteRows {
            rows: stmt.raw_query(),
            sql,
            columns: Arc::clone(columns),
            state,
        })
    }

    fn execute(&mut self) -> Result<usize> {
        self.check_ready()?;
        let stmt = Self::stmt(&mut self.inner)?;
        self.state = StatementState::Done;
        let changed = stmt
            .raw_execute()
            .map_err(|e| query_error(e, &self.sql, Phase::Execute))?;
        tracing::trace!(sql = %self.sql, changed, "Executed statement");
        Ok(changed)
    }

    fn reset(&mut self, clear_bindings: bool) -> Result<()> {
        if clear_bindings && self.parameter_count > 0 {
            let stmt = Self::stmt(&mut self.inner)?;
            for slot in 1..=self.parameter_count {
                stmt.raw_bind_parameter(slot, rusqlite::types::Null)
                    .map_err(|e| query_error(e, &self.sql, Phase::Execute))?;
            }
            self.state = StatementState::Unbound;
        } else if self.state != StatementState::Unbound {
            self.state = StatementState::Bound;
        }
        Ok(())
    }
}

impl Drop for SqliteStatement<'_> {
    fn drop(&mut self) {
        if let Some(stmt) = self.inner.take() {
            if let Err(e) = stmt.finalize() {
                tracing::error!(sql = %self.sql, error = %e, "Failed to finalize statement");
            }
        }
    }
}

impl std::fmt::Debug for SqliteStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("sql", &self.sql)
            .field("parameter_count", &self.parameter_count)
            .field("columns", &self.columns)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Forward-only cursor over a running statement.
///
/// Holds the statement mutably, so nothing else can bind or step it while rows are read.
pub struct SqliteRows<'s> {
    rows: rusqlite::Rows<'s>,
    sql: &'s str,
    columns: Arc<[String]>,
    state: &'s mut StatementState,
}

impl RowCursor for SqliteRows<'_> {
    fn step(&mut self) -> Result<Option<Row>> {
        if *self.state == StatementState::Done {
            return Err(Error::internal(
                InternalErrorKind::StatementCompleted,
                format!("statement already completed: {}", self.sql),
            ));
        }

        match self.rows.next() {
            Ok(Some(row)) => {
                let mut values = Vec::with_capacity(self.columns.len());
                for i in 0..self.columns.len() {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| query_error(e, self.sql, Phase::Execute))?;
                    values.push(read_value(value));
                }
                Ok(Some(Row::new(Arc::clone(&self.columns), values)))
            }
            Ok(None) => {
                *self.state = StatementState::Done;
                tracing::trace!(sql = %self.sql, "Statement completed");
                Ok(None)
            }
            Err(e) => {
                *self.state = StatementState::Done;
                Err(query_error(e, self.sql, Phase::Execute))
            }
        }
    }
}
