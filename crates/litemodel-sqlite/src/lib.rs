//! SQLite driver for litemodel.
//!
//! Wraps the bundled engine through `rusqlite` and implements the `litemodel-core`
//! `Connection`, `PreparedStatement` and `RowCursor` traits.
//!
//! - [`SqliteConfig`] describes how to open a database (path, mode, pragmas, limits).
//! - [`SqliteConnection`] owns the handle; it closes on drop.
//! - [`SqliteStatement`] tracks its bind/step state and finalizes on drop.
//! - [`SqliteRows`] steps a running statement one row at a time.
//!
//! ```ignore
//! use litemodel_core::{Connection, PreparedStatement, RowCursor, Value};
//! use litemodel_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory()?;
//! let mut stmt = conn.prepare("SELECT ? * 2")?;
//! stmt.bind(&[Value::BigInt(21)])?;
//! let row = stmt.query()?.step()?;
//! ```

pub mod config;
pub mod connection;
mod error;
pub mod statement;

pub use config::{DEFAULT_MAX_BIND_PARAMETERS, OpenMode, SqliteConfig};
pub use connection::SqliteConnection;
pub use statement::{SqliteRows, SqliteStatement};
