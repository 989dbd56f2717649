//! SQLite connection configuration.

use std::time::Duration;

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

/// Engine default for `SQLITE_MAX_VARIABLE_NUMBER`.
pub const DEFAULT_MAX_BIND_PARAMETERS: usize = 32766;

/// How the database file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Open an existing database for reading only
    ReadOnly,
    /// Open an existing database for reading and writing
    ReadWrite,
    /// Open for reading and writing, creating the file if needed
    #[default]
    ReadWriteCreate,
}

impl OpenMode {
    /// Engine open flags for this mode.
    pub fn flags(self, uri: bool) -> OpenFlags {
        let mut flags = match self {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        flags |= OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if uri {
            flags |= OpenFlags::SQLITE_OPEN_URI;
        }
        flags
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, OpenMode::ReadOnly)
    }
}

/// SQLite connection configuration.
///
/// Deserializable with every field optional:
///
/// ```ignore
/// let config: SqliteConfig = serde_json::from_str(r#"{"path": "school.db", "busy_timeout_ms": 500}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path, URI, or `:memory:` (default)
    pub path: String,
    /// Open mode (default: read-write-create)
    pub mode: OpenMode,
    /// Interpret `path` as a `file:` URI
    pub uri: bool,
    /// Enforce foreign keys (default: true)
    pub foreign_keys: bool,
    /// How long to wait on a locked database before failing
    pub busy_timeout_ms: Option<u64>,
    /// Upper bound on parameters per statement, used to split batched inserts
    pub max_bind_parameters: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            mode: OpenMode::default(),
            uri: false,
            foreign_keys: true,
            busy_timeout_ms: None,
            max_bind_parameters: DEFAULT_MAX_BIND_PARAMETERS,
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A private in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A database file, created if missing.
    pub fn file(path: impl Into<String>) -> Self {
        Self::default().path(path)
    }

    /// Set the database path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the open mode.
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Treat `path` as a URI.
    pub fn uri(mut self, uri: bool) -> Self {
        self.uri = uri;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the per-statement parameter limit.
    pub fn max_bind_parameters(mut self, max: usize) -> Self {
        self.max_bind_parameters = max.max(1);
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path == ":memory:" || self.path.is_empty()
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }

    pub fn open_flags(&self) -> OpenFlags {
        self.mode.flags(self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SqliteConfig::default();
        assert!(config.is_memory());
        assert_eq!(config.mode, OpenMode::ReadWriteCreate);
        assert!(config.foreign_keys);
        assert_eq!(config.max_bind_parameters, DEFAULT_MAX_BIND_PARAMETERS);
        assert_eq!(config.busy_timeout(), None);
    }

    #[test]
    fn test_builder() {
        let config = SqliteConfig::file("school.db")
            .mode(OpenMode::ReadOnly)
            .foreign_keys(false)
            .busy_timeout_ms(250)
            .max_bind_parameters(0);
        assert_eq!(config.path, "school.db");
        assert!(!config.is_memory());
        assert!(config.mode.is_read_only());
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_bind_parameters, 1);
    }

    #[test]
    fn test_open_flags() {
        let flags = OpenMode::ReadOnly.flags(true);
        assert!(flags.contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
        assert!(flags.contains(OpenFlags::SQLITE_OPEN_URI));
        assert!(!flags.contains(OpenFlags::SQLITE_OPEN_CREATE));

        let flags = OpenMode::ReadWriteCreate.flags(false);
        assert!(flags.contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert!(!flags.contains(OpenFlags::SQLITE_OPEN_URI));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SqliteConfig = serde_json::from_str(
            r#"{"path": "file:school.db?cache=shared", "uri": true, "mode": "read_write"}"#,
        )
        .unwrap();
        assert_eq!(config.path, "file:school.db?cache=shared");
        assert!(config.uri);
        assert_eq!(config.mode, OpenMode::ReadWrite);
        assert!(config.foreign_keys);
        assert_eq!(config.max_bind_parameters, DEFAULT_MAX_BIND_PARAMETERS);

        let config: SqliteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SqliteConfig::default());
    }
}
