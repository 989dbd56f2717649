//! SQLite connection.

use litemodel_core::error::ConnectionErrorKind;
use litemodel_core::{Connection, Result};

use crate::config::{OpenMode, SqliteConfig};
use crate::error::{Phase, connection_error, query_error};
use crate::statement::SqliteStatement;

/// An open SQLite database.
///
/// `Send` but not `Sync`: one thread uses a connection at a time. Closed on drop;
/// call [`close`](Self::close) to observe close failures.
pub struct SqliteConnection {
    inner: Option<rusqlite::Connection>,
    path: String,
    max_bind_parameters: usize,
}

impl SqliteConnection {
    /// Open a database as described by `config` and apply its settings.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let inner =
            rusqlite::Connection::open_with_flags(&config.path, config.open_flags()).map_err(|e| {
                connection_error(
                    e,
                    ConnectionErrorKind::Open,
                    &format!("failed to open {}", config.path),
                )
            })?;

        if let Some(timeout) = config.busy_timeout() {
            inner.busy_timeout(timeout).map_err(|e| {
                connection_error(e, ConnectionErrorKind::Configure, "failed to set busy timeout")
            })?;
        }

        let pragma = if config.foreign_keys {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        inner.execute_batch(pragma).map_err(|e| {
            connection_error(e, ConnectionErrorKind::Configure, "failed to set foreign_keys")
        })?;

        tracing::info!(
            path = %config.path,
            mode = ?config.mode,
            foreign_keys = config.foreign_keys,
            "Opened SQLite connection"
        );
        Ok(Self {
            inner: Some(inner),
            path: config.path.clone(),
            max_bind_parameters: config.max_bind_parameters,
        })
    }

    /// Open `path` in the given mode with otherwise default settings.
    pub fn open_with_flags(path: impl Into<String>, mode: OpenMode) -> Result<Self> {
        Self::open(&SqliteConfig::file(path).mode(mode))
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the handle, reporting any failure.
    pub fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(inner) => {
                inner.close().map_err(|(_, e)| {
                    tracing::error!(path = %self.path, error = %e, "Failed to close SQLite connection");
                    connection_error(e, ConnectionErrorKind::Close, "failed to close connection")
                })?;
                tracing::info!(path = %self.path, "Closed SQLite connection");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn raw(&self) -> Result<&rusqlite::Connection> {
        self.inner.as_ref().ok_or_else(|| {
            litemodel_core::Error::Connection(litemodel_core::ConnectionError {
                kind: ConnectionErrorKind::Close,
                message: "connection is closed".to_string(),
                source: None,
            })
        })
    }
}

impl Connection for SqliteConnection {
    type Statement<'c> = SqliteStatement<'c>;

    fn prepare<'c>(&'c self, sql: &str) -> Result<SqliteStatement<'c>> {
        let stmt = self
            .raw()?
            .prepare(sql)
            .map_err(|e| query_error(e, sql, Phase::Prepare))?;
        tracing::trace!(sql, "Prepared statement");
        Ok(SqliteStatement::new(stmt, sql))
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "Executing batch");
        self.raw()?
            .execute_batch(sql)
            .map_err(|e| query_error(e, sql, Phase::Execute))
    }

    fn last_insert_rowid(&self) -> i64 {
        self.inner
            .as_ref()
            .map_or(0, rusqlite::Connection::last_insert_rowid)
    }

    fn max_bind_parameters(&self) -> usize {
        self.max_bind_parameters
    }

    fn is_autocommit(&self) -> bool {
        self.inner
            .as_ref()
            .is_none_or(rusqlite::Connection::is_autocommit)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            match inner.close() {
                Ok(()) => tracing::info!(path = %self.path, "Closed SQLite connection"),
                Err((_, e)) => {
                    tracing::error!(path = %self.path, error = %e, "Failed to close SQLite connection");
                }
            }
        }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("open", &self.inner.is_some())
            .field("max_bind_parameters", &self.max_bind_parameters)
            .finish()
    }
}
