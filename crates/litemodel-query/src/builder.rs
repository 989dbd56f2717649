//! Query builders for INSERT, UPDATE, DELETE operations.
//!
//! Inserts and updates are driven by a record; deletes by a filter or by a record's
//! primary key. Every builder can render its SQL with `build()` before running it.

use std::marker::PhantomData;

use litemodel_core::{
    ColumnRef, Connection, Error, InternalErrorKind, PreparedStatement, Result, Table, TableInfo,
    Value, quote_ident,
};

use crate::clause::{Where, and_filter};
use crate::expr::{CompareOp, Expr};

const BATCH_SAVEPOINT: &str = "litemodel_insert_many";

/// Column list and the VALUES tuple for one record.
///
/// Auto-increment keys become a literal `NULL` so the engine assigns them; every other
/// column is a placeholder.
fn insert_shape(info: &TableInfo) -> (String, String, usize) {
    let columns: Vec<String> = info.columns.iter().map(|c| quote_ident(c.name)).collect();
    let slots: Vec<&str> = info
        .columns
        .iter()
        .map(|c| if c.is_autoincrement() { "NULL" } else { "?" })
        .collect();
    let bound = info.columns.iter().filter(|c| !c.is_autoincrement()).count();
    (columns.join(", "), format!("({})", slots.join(", ")), bound)
}

fn insert_values<T: Table>(record: &T, out: &mut Vec<Value>) {
    let info = T::info();
    out.extend(
        record
            .to_values()
            .into_iter()
            .zip(info.columns)
            .filter(|(_, c)| !c.is_autoincrement())
            .map(|(v, _)| v),
    );
}

/// INSERT of a single record.
///
/// # Example
///
/// ```ignore
/// let rowid = InsertBuilder::new(&student).execute(&conn)?;
/// ```
#[derive(Debug)]
pub struct InsertBuilder<'a, T: Table> {
    record: &'a T,
}

impl<'a, T: Table> InsertBuilder<'a, T> {
    /// Create a new INSERT builder for the given record.
    pub fn new(record: &'a T) -> Self {
        Self { record }
    }

    /// Build the INSERT SQL and parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let info = T::info();
        let (columns, tuple, bound) = insert_shape(info);
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(info.name),
            columns,
            tuple
        );
        let mut params = Vec::with_capacity(bound);
        insert_values(self.record, &mut params);
        (sql, params)
    }

    /// Run the insert and return the engine's row id for the new row.
    pub fn execute<C: Connection>(self, conn: &C) -> Result<i64> {
        let (sql, params) = self.build();
        tracing::debug!(sql = %sql, params = params.len(), "Executing insert");
        let mut stmt = conn.prepare(&sql)?;
        stmt.bind(&params)?;
        stmt.execute()?;
        Ok(conn.last_insert_rowid())
    }
}

/// Multi-row INSERT, split into statements that stay under the connection's parameter
/// limit.
///
/// # Example
///
/// ```ignore
/// let inserted = InsertManyBuilder::new(&students).execute(&conn)?;
/// ```
#[derive(Debug)]
pub struct InsertManyBuilder<'a, T: Table> {
    records: &'a [T],
}

impl<'a, T: Table> InsertManyBuilder<'a, T> {
    pub fn new(records: &'a [T]) -> Self {
        Self { records }
    }

    /// Records per statement when each statement may bind at most `max_parameters`.
    pub fn rows_per_statement(&self, max_parameters: usize) -> usize {
        let (_, _, bound) = insert_shape(T::info());
        if bound == 0 {
            return self.records.len().max(1);
        }
        (max_parameters / bound).max(1)
    }

    fn sql_for(rows: usize) -> String {
        let info = T::info();
        let (columns, tuple, _) = insert_shape(info);
        let tuples = vec![tuple; rows].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(info.name),
            columns,
            tuples
        )
    }

    /// Build one (SQL, parameters) pair per statement.
    pub fn build_batches(&self, max_parameters: usize) -> Vec<(String, Vec<Value>)> {
        let per_statement = self.rows_per_statement(max_parameters);
        self.records
            .chunks(per_statement)
            .map(|chunk| {
                let mut params = Vec::new();
                for record in chunk {
                    insert_values(record, &mut params);
                }
                (Self::sql_for(chunk.len()), params)
            })
            .collect()
    }

    /// Insert every record and return the number of rows inserted.
    ///
    /// An empty slice does nothing. Full-size batches share one prepared statement. When the
    /// records span several statements they run inside a savepoint, so a failing batch leaves
    /// none of the rows behind.
    pub fn execute<C: Connection>(self, conn: &C) -> Result<usize> {
        if self.records.is_empty() {
            return Ok(0);
        }
        let per_statement = self.rows_per_statement(conn.max_bind_parameters());
        if self.records.len() <= per_statement {
            return self.execute_chunks(conn, per_statement);
        }

        conn.execute_batch(&format!("SAVEPOINT {BATCH_SAVEPOINT}"))?;
        match self.execute_chunks(conn, per_statement) {
            Ok(inserted) => {
                conn.execute_batch(&format!("RELEASE {BATCH_SAVEPOINT}"))?;
                Ok(inserted)
            }
            Err(err) => {
                let undo = format!("ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT}");
                if let Err(rollback) = conn.execute_batch(&undo) {
                    tracing::error!(error = %rollback, "Failed to roll back batch insert");
                } else {
                    tracing::debug!(error = %err, "Rolled back batch insert");
                }
                Err(err)
            }
        }
    }

    fn execute_chunks<C: Connection>(&self, conn: &C, per_statement: usize) -> Result<usize> {
        let full_sql = Self::sql_for(per_statement);
        let mut full = if self.records.len() >= per_statement {
            tracing::debug!(sql = %full_sql, rows = per_statement, "Preparing batch insert");
            Some(conn.prepare(&full_sql)?)
        } else {
            None
        };
        let mut inserted = 0;

        for chunk in self.records.chunks(per_statement) {
            let mut params = Vec::new();
            for record in chunk {
                insert_values(record, &mut params);
            }

            match &mut full {
                Some(stmt) if chunk.len() == per_statement => {
                    stmt.rewind()?;
                    stmt.bind(&params)?;
                    inserted += stmt.execute()?;
                }
                _ => {
                    let sql = Self::sql_for(chunk.len());
                    tracing::debug!(sql = %sql, rows = chunk.len(), "Executing batch insert");
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.bind(&params)?;
                    inserted += stmt.execute()?;
                }
            }
        }
        Ok(inserted)
    }
}

/// UPDATE of one record by primary key.
///
/// Every non-key column is written, in declaration order, followed by the key in the
/// WHERE clause.
#[derive(Debug)]
pub struct UpdateBuilder<'a, T: Table> {
    record: &'a T,
}

impl<'a, T: Table> UpdateBuilder<'a, T> {
    pub fn new(record: &'a T) -> Self {
        Self { record }
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let info = T::info();
        let Some((pk_index, pk)) = info.primary_key() else {
            return Err(Error::internal(
                InternalErrorKind::MissingPrimaryKey,
                format!("cannot update `{}`: the table has no primary key", info.name),
            ));
        };

        let values = self.record.to_values();
        let mut assignments = Vec::with_capacity(info.width());
        let mut params = Vec::with_capacity(info.width());
        let mut key = Value::Null;
        for (i, (column, value)) in info.columns.iter().zip(values).enumerate() {
            if i == pk_index {
                key = value;
            } else {
                assignments.push(format!("{} = ?", quote_ident(column.name)));
                params.push(value);
            }
        }
        if assignments.is_empty() {
            return Err(Error::internal(
                InternalErrorKind::InvalidQuery,
                format!("cannot update `{}`: it has no columns besides the key", info.name),
            ));
        }
        params.push(key);

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(info.name),
            assignments.join(", "),
            quote_ident(pk.name)
        );
        Ok((sql, params))
    }

    /// Run the update and return the number of rows changed.
    pub fn execute<C: Connection>(self, conn: &C) -> Result<usize> {
        let (sql, params) = self.build()?;
        tracing::debug!(sql = %sql, params = params.len(), "Executing update");
        let mut stmt = conn.prepare(&sql)?;
        stmt.bind(&params)?;
        stmt.execute()
    }
}

/// `WHERE pk = ?` for `record`, or `None` when the table has no primary key.
fn primary_key_filter<T: Table>(record: &T) -> Option<Expr> {
    let info = T::info();
    let (_, pk) = info.primary_key()?;
    let value = record.primary_key_value()?;
    Some(Expr::compare(
        ColumnRef::new(info.name, pk.name),
        CompareOp::Eq,
        value,
    ))
}

/// DELETE query builder.
///
/// # Example
///
/// ```ignore
/// let removed = Delete::<_, Student>::new(&conn)
///     .filter(Student::YEAR.eq(4))
///     .execute()?;
/// ```
pub struct Delete<'c, C: Connection, T: Table> {
    conn: &'c C,
    filter: Option<Where>,
    missing_key: bool,
    _table: PhantomData<fn() -> T>,
}

impl<'c, C: Connection, T: Table> Delete<'c, C, T> {
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            filter: None,
            missing_key: false,
            _table: PhantomData,
        }
    }

    /// Add a WHERE condition, AND-combined with earlier ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(and_filter(self.filter.take(), expr));
        self
    }

    /// Restrict the delete to `record`'s row, matched by primary key.
    ///
    /// A table without a primary key fails when the query is built.
    pub fn from_record(mut self, record: &T) -> Self {
        match primary_key_filter(record) {
            Some(expr) => self.filter(expr),
            None => {
                self.missing_key = true;
                self
            }
        }
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.missing_key {
            return Err(Error::internal(
                InternalErrorKind::MissingPrimaryKey,
                format!("cannot match a `{}` record: the table has no primary key", T::TABLE_NAME),
            ));
        }
        let mut sql = format!("DELETE FROM {}", quote_ident(T::TABLE_NAME));
        if let Some(filter) = &self.filter {
            filter.write_sql(&mut sql);
        }
        let params = self
            .filter
            .as_ref()
            .map(|f| f.expr().bindings())
            .unwrap_or_default();
        Ok((sql, params))
    }

    /// Compile the delete so it can be run again with new values.
    pub fn prepare(self) -> Result<PreparedDelete<'c, C>> {
        let (sql, params) = self.build()?;
        tracing::debug!(sql = %sql, params = params.len(), "Preparing delete");
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.bind(&params)?;
        Ok(PreparedDelete {
            stmt,
            filter_sql: self.filter.map(|f| f.expr().serialize()),
            _conn: PhantomData,
        })
    }

    /// Run the delete and return the number of rows removed.
    pub fn execute(self) -> Result<usize> {
        self.prepare()?.execute()
    }
}

/// A compiled DELETE.
pub struct PreparedDelete<'c, C: Connection + 'c> {
    stmt: C::Statement<'c>,
    filter_sql: Option<String>,
    _conn: PhantomData<&'c C>,
}

impl<'c, C: Connection + 'c> PreparedDelete<'c, C> {
    pub fn sql(&self) -> &str {
        self.stmt.sql()
    }

    /// Swap in new WHERE values; the expression must render to the same SQL.
    pub fn rebind(&mut self, expr: &Expr) -> Result<()> {
        let Some(filter_sql) = &self.filter_sql else {
            return Err(Error::internal(
                InternalErrorKind::InvalidQuery,
                "delete was prepared without a filter; nothing to rebind",
            ));
        };
        let sql = expr.serialize();
        if &sql != filter_sql {
            return Err(Error::internal(
                InternalErrorKind::BindingMismatch,
                format!("rebind expects `{filter_sql}`, got `{sql}`"),
            ));
        }
        self.stmt.bind(&expr.bindings())
    }

    /// Run the delete and return the number of rows removed. Can be called again after
    /// a rebind.
    pub fn execute(&mut self) -> Result<usize> {
        self.stmt.rewind()?;
        self.stmt.execute()
    }
}
