//! Core types and traits for litemodel.
//!
//! `litemodel-core` is the foundation every other crate in the workspace builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Table` is implemented by user records (usually through
//!   `#[derive(Table)]`), and `Connection` / `PreparedStatement` / `RowCursor` are
//!   implemented by the driver.
//! - **Data model**: `Value`, `SqlType`, `FieldType` and `Row` carry data between records,
//!   builders and the engine.
//! - **Metadata**: `TableInfo`, `ColumnInfo` and `Constraint` describe tables statically;
//!   `Field<T, V>` is the typed handle queries are built from; `ForeignKeyGraph` links
//!   tables for validation and join inference.

pub mod connection;
pub mod error;
pub mod field;
pub mod foreign_key;
pub mod identifiers;
pub mod row;
pub mod table;
pub mod types;
pub mod value;

pub use connection::{Connection, PreparedStatement, RowCursor, StatementState, expand_bindings};
pub use error::{
    ConnectionError, ConnectionErrorKind, ConstraintKind, Error, InternalError, InternalErrorKind,
    QueryError, QueryErrorKind, Result, TypeError,
};
pub use field::{
    Collation, ColumnInfo, ColumnRef, ConflictClause, Constraint, Field, ForeignKey,
    ReferentialAction,
};
pub use foreign_key::{Edge, ForeignKeyGraph, Link};
pub use identifiers::{is_plain_identifier, quote_ident};
pub use row::Row;
pub use table::{Accessor, Table, TableInfo, load_with, values_with};
pub use types::{FieldType, SqlType};
pub use value::Value;
