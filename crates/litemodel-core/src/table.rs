//! The `Table` trait and static table descriptors.

use crate::error::Result;
use crate::field::{ColumnInfo, ForeignKey};
use crate::row::Row;
use crate::value::Value;

/// Static description of a table: its name and its columns in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    pub name: &'static str,
    pub columns: &'static [ColumnInfo],
}

impl TableInfo {
    pub const fn new(name: &'static str, columns: &'static [ColumnInfo]) -> Self {
        Self { name, columns }
    }

    /// Number of columns the table contributes to a `SELECT t.*`.
    pub const fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The primary-key column and its position, if one is declared.
    pub fn primary_key(&self) -> Option<(usize, &'static ColumnInfo)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.is_primary_key())
    }

    /// Every foreign key declared on this table, paired with the owning column.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&'static ColumnInfo, &'static ForeignKey)> {
        self.columns
            .iter()
            .flat_map(|c| c.foreign_keys().map(move |fk| (c, fk)))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().map(|c| c.name)
    }
}

/// A record type mapped onto one table.
///
/// Usually derived with `#[derive(Table)]`. A manual implementation can describe its
/// columns with [`Accessor`] getter/setter pairs and delegate to [`values_with`] and
/// [`load_with`].
pub trait Table: Sized {
    /// Name of the table in the database.
    const TABLE_NAME: &'static str;

    /// Column metadata, resolved once.
    fn info() -> &'static TableInfo;

    /// Values for every column, in declaration order.
    fn to_values(&self) -> Vec<Value>;

    /// Build a record from `row`, reading this table's columns starting at `offset`.
    fn from_row(row: &Row, offset: usize) -> Result<Self>;

    /// Value of the primary key, or `None` when the table has no primary key.
    fn primary_key_value(&self) -> Option<Value>;

    /// Store an engine-assigned row id into the integer primary key.
    fn set_row_id(&mut self, _id: i64) {}
}

/// A getter/setter pair mapping one field of `T` onto one column.
pub struct Accessor<T> {
    pub column: &'static str,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, &Value) -> Result<()>,
}

/// Collect column values through getters.
pub fn values_with<T>(record: &T, accessors: &[Accessor<T>]) -> Vec<Value> {
    accessors.iter().map(|a| (a.get)(record)).collect()
}

/// Build a default record and fill it through setters, one column per accessor.
pub fn load_with<T: Default>(row: &Row, offset: usize, accessors: &[Accessor<T>]) -> Result<T> {
    let mut record = T::default();
    for (i, accessor) in accessors.iter().enumerate() {
        let index = offset + i;
        let value = row.get(index).unwrap_or(&Value::Null);
        (accessor.set)(&mut record, value).map_err(|e| e.at_column(index))?;
    }
    Ok(record)
}
