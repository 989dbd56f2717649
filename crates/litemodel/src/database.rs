//! A connection paired with the schema it serves.

use litemodel_core::{
    ColumnRef, Connection, Error, InternalErrorKind, Result, SqlType, Table, Value,
};
use litemodel_query::{
    CompareOp, Delete, Expr, InsertBuilder, InsertManyBuilder, Select, SelectList, UpdateBuilder,
    all,
};
use litemodel_schema::{Schema, create_table_sql, drop_table_sql, truncate_sql};
use litemodel_sqlite::{SqliteConfig, SqliteConnection};

/// Owns a connection and a validated [`Schema`].
///
/// ```ignore
/// let db = Database::open(
///     &SqliteConfig::memory(),
///     Schema::new().table::<Student>().table::<Enrollment>(),
/// )?;
/// db.create_tables(true)?;
/// let mut ann = Student { id: 0, name: "Ann".into(), year: 2, gpa: 3.4 };
/// db.insert_record(&mut ann)?;
/// ```
#[derive(Debug)]
pub struct Database<C: Connection> {
    conn: C,
    schema: Schema,
}

impl Database<SqliteConnection> {
    /// Open a SQLite database and attach `schema` to it.
    pub fn open(config: &SqliteConfig, schema: Schema) -> Result<Self> {
        Self::new(SqliteConnection::open(config)?, schema)
    }
}

impl<C: Connection> Database<C> {
    /// Wrap `conn`, failing if `schema` has duplicate tables or unresolved foreign keys.
    pub fn new(conn: C, schema: Schema) -> Result<Self> {
        schema.validate()?;
        Ok(Self { conn, schema })
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Create every registered table, in registration order.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn create_tables(&self, if_not_exists: bool) -> Result<()> {
        for sql in self.schema.create_statements(if_not_exists) {
            self.conn.execute_batch(&sql)?;
        }
        tracing::info!(tables = self.schema.tables().len(), "Created tables");
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(table = T::TABLE_NAME))]
    pub fn create_table<T: Table>(&self, if_not_exists: bool) -> Result<()> {
        self.conn
            .execute_batch(&create_table_sql(T::info(), if_not_exists))?;
        tracing::info!(table = T::TABLE_NAME, "Created table");
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(table = T::TABLE_NAME))]
    pub fn drop_table<T: Table>(&self, if_exists: bool) -> Result<()> {
        let sql = drop_table_sql(T::TABLE_NAME, if_exists);
        tracing::debug!(sql = %sql, "Dropping table");
        self.conn.execute_batch(&sql)
    }

    /// Delete every row of `T`'s table.
    #[tracing::instrument(level = "debug", skip(self), fields(table = T::TABLE_NAME))]
    pub fn truncate<T: Table>(&self) -> Result<()> {
        let sql = truncate_sql(T::TABLE_NAME);
        tracing::debug!(sql = %sql, "Truncating table");
        self.conn.execute_batch(&sql)
    }

    /// Insert `record` and return its row id.
    ///
    /// When the primary key is an INTEGER column the row id is written back into it, so an
    /// auto-increment key holds the assigned value afterwards.
    #[tracing::instrument(level = "debug", skip_all, fields(table = T::TABLE_NAME))]
    pub fn insert_record<T: Table>(&self, record: &mut T) -> Result<i64> {
        let rowid = InsertBuilder::new(&*record).execute(&self.conn)?;
        if T::info()
            .primary_key()
            .is_some_and(|(_, pk)| pk.sql_type == SqlType::Integer)
        {
            record.set_row_id(rowid);
        }
        Ok(rowid)
    }

    /// Insert `records` in as few statements as the parameter limit allows.
    #[tracing::instrument(level = "debug", skip_all, fields(table = T::TABLE_NAME, count = records.len()))]
    pub fn insert_many_records<T: Table>(&self, records: &[T]) -> Result<usize> {
        InsertManyBuilder::new(records).execute(&self.conn)
    }

    /// Look up one record by primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(table = T::TABLE_NAME))]
    pub fn find_record<T: Table>(&self, pk: impl Into<Value>) -> Result<Option<T>> {
        let info = T::info();
        let Some((_, column)) = info.primary_key() else {
            return Err(Error::internal(
                InternalErrorKind::MissingPrimaryKey,
                format!("cannot look up `{}` by key: the table has no primary key", info.name),
            ));
        };
        self.select_query(all::<T>())
            .filter(Expr::compare(
                ColumnRef::new(info.name, column.name),
                CompareOp::Eq,
                pk,
            ))
            .one_or_none()
    }

    /// Write every non-key column of `record`, matched by primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(table = T::TABLE_NAME))]
    pub fn update_record<T: Table>(&self, record: &T) -> Result<usize> {
        UpdateBuilder::new(record).execute(&self.conn)
    }

    /// Delete `record`'s row, matched by primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(table = T::TABLE_NAME))]
    pub fn delete_record<T: Table>(&self, record: &T) -> Result<usize> {
        Delete::<C, T>::new(&self.conn).from_record(record).execute()
    }

    /// Start a SELECT. Join failures can name missing tables from the schema.
    pub fn select_query<S: SelectList>(&self, selection: S) -> Select<'_, C, S> {
        Select::new(&self.conn, selection).with_graph(self.schema.graph())
    }

    /// Start a DELETE on `T`'s table.
    pub fn delete_query<T: Table>(&self) -> Delete<'_, C, T> {
        Delete::new(&self.conn)
    }

    /// Run `f` inside BEGIN / COMMIT. An error from `f` rolls back and is returned.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Self) -> Result<R>,
    {
        self.conn.execute_batch("BEGIN")?;
        let outcome = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });
        match outcome {
            Ok(value) => {
                tracing::debug!("Committed transaction");
                Ok(value)
            }
            Err(err) => {
                self.rollback(&err);
                Err(err)
            }
        }
    }

    /// Roll back after `err`. A connection with no open transaction is left alone.
    fn rollback(&self, err: &Error) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
            tracing::error!(error = %rollback, "Failed to roll back transaction");
        } else {
            tracing::debug!(error = %err, "Rolled back transaction");
        }
    }
}
