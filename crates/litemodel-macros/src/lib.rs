//! Procedural macros for litemodel.
//!
//! `#[derive(Table)]` turns a plain struct into a table descriptor at compile time:
//!
//! ```ignore
//! use litemodel::prelude::*;
//!
//! #[derive(Debug, Table)]
//! #[litemodel(table = "students")]
//! pub struct Student {
//!     #[litemodel(primary_key, autoincrement)]
//!     pub id: i64,
//!     #[litemodel(unique)]
//!     pub name: String,
//!     pub year: i32,
//!     pub gpa: f64,
//! }
//!
//! let honours = Student::GPA.ge(3.5);
//! ```
//!
//! Each column becomes an associated `Field` constant named after the field in upper case.
//! Foreign keys point at those constants (`references(Student::ID)`), so a reference to a
//! table or column that does not exist fails to compile.
//!
//! Generated code names `litemodel_core`, which is in scope through a direct dependency or
//! through `litemodel::prelude`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod table_derive;

/// Derive the `Table` trait.
///
/// Struct attribute: `#[litemodel(table = "name")]` (default: snake_case plural of the
/// struct name).
///
/// Field attributes, applied in the order written:
///
/// - `column = "name"`
/// - `primary_key` or `primary_key(on_conflict = "replace")`, plus `autoincrement`
/// - `not_null`, `unique` (each optionally with `(on_conflict = "...")`)
/// - `default = "sql"`, `check = "sql"`, `collate = "nocase"`
/// - `references(Other::FIELD, on_update = "cascade", on_delete = "set_null")`
/// - `skip`: not a column; loaded as `Default::default()`
#[proc_macro_derive(Table, attributes(litemodel))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match table_derive::parse_table(&input) {
        Ok(def) => table_derive::generate_table_impl(&def).into(),
        Err(e) => e.to_compile_error().into(),
    }
}
