//! litemodel: compile-time mapping between Rust records and SQLite rows.
//!
//! Records derive [`Table`](litemodel_macros::Table), which generates static column metadata and
//! typed `Field` constants. Queries are built from those constants, so a misspelled column or
//! a mistyped comparison fails to compile instead of failing at run time.
//!
//! ```ignore
//! use litemodel::prelude::*;
//!
//! #[derive(Debug, Table)]
//! struct Student {
//!     #[litemodel(primary_key, autoincrement)]
//!     id: i64,
//!     name: String,
//!     year: i32,
//!     gpa: f64,
//! }
//!
//! let db = Database::open(&SqliteConfig::memory(), Schema::new().table::<Student>())?;
//! db.create_tables(true)?;
//! let struggling = db
//!     .select_query(count(Student::ID))
//!     .filter(Student::GPA.lt(3.0))
//!     .one()?;
//! ```
//!
//! # Crates
//!
//! - `litemodel-core`: values, rows, table metadata, errors and the driver traits
//! - `litemodel-macros`: `#[derive(Table)]`
//! - `litemodel-schema`: DDL and the schema registry
//! - `litemodel-query`: expressions and query builders
//! - `litemodel-sqlite`: the SQLite driver

pub mod database;

pub use database::Database;

pub use litemodel_core::{Error, Result, Value};
pub use litemodel_macros::Table;
pub use litemodel_schema::Schema;
pub use litemodel_sqlite::{OpenMode, SqliteConfig, SqliteConnection};

/// Everything needed to declare tables and query them.
pub mod prelude {
    // Generated code refers to `litemodel_core::...`.
    pub use litemodel_core;

    pub use litemodel_core::{
        ColumnRef, Connection, ConstraintKind, Error, Field, FieldType, InternalErrorKind,
        PreparedStatement, Result, Row, RowCursor, SqlType, StatementState, Table, TableInfo,
        Value,
    };
    pub use litemodel_macros::Table;
    pub use litemodel_query::{
        Direction, Expr, FieldExt, JoinKind, PreparedSelect, Select, all, count, count_all,
        count_distinct,
    };
    pub use litemodel_schema::Schema;
    pub use litemodel_sqlite::{OpenMode, SqliteConfig, SqliteConnection};

    pub use crate::Database;
}
