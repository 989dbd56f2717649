//! Error types for litemodel.
//!
//! Every fallible operation in the workspace returns [`Result`]. Errors are grouped by
//! the layer that produced them so callers can branch on the ones they expect (most
//! notably constraint violations) and propagate the rest.

use std::fmt;

/// The result type used throughout litemodel.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type.
#[derive(Debug)]
pub enum Error {
    /// The database file could not be opened, configured, or closed.
    Connection(ConnectionError),
    /// Preparing or executing a statement failed.
    Query(QueryError),
    /// A stored value could not be converted into the requested Rust type.
    Type(TypeError),
    /// A programming error: bad binding counts, misuse of a statement, bad references.
    Internal(InternalError),
    /// A row-count expectation was not met (`one`, `one_or_none`).
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Opening the database file failed
    Open,
    /// Applying connection settings (pragmas, busy timeout) failed
    Configure,
    /// Closing the handle failed
    Close,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    /// SQL text of the failing statement, when known
    pub sql: Option<String>,
    /// Extended engine result code, when known
    pub code: Option<i32>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The SQL text was rejected by the engine while compiling
    Prepare,
    /// Execution was refused because a constraint would be violated
    Constraint(ConstraintKind),
    /// Any other failure while binding or stepping
    Execution,
}

/// Which constraint an execution error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    /// What the destination type accepts
    pub expected: &'static str,
    /// The storage class that was found
    pub found: &'static str,
    /// Physical result column, when known
    pub column: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub kind: InternalErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalErrorKind {
    /// The number of supplied values does not match the statement's parameter slots
    BindingMismatch,
    /// The statement must be rewound or reset before it can be stepped again
    StatementCompleted,
    /// A table or column that the query refers to is not known
    UnresolvedReference,
    /// The query cannot be expressed (e.g. a selected table was never joined)
    InvalidQuery,
    /// The operation requires a primary key the table does not declare
    MissingPrimaryKey,
    /// The materialization layout does not match the statement's result columns
    LayoutMismatch,
}

impl Error {
    /// Build an internal error of the given kind.
    pub fn internal(kind: InternalErrorKind, message: impl Into<String>) -> Self {
        Error::Internal(InternalError {
            kind,
            message: message.into(),
        })
    }

    /// Whether this error reports a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        self.constraint_kind().is_some()
    }

    /// The violated constraint, if this is a constraint violation.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Error::Query(QueryError {
                kind: QueryErrorKind::Constraint(kind),
                ..
            }) => Some(*kind),
            _ => None,
        }
    }

    /// The internal error kind, if this is an internal error.
    pub fn internal_kind(&self) -> Option<InternalErrorKind> {
        match self {
            Error::Internal(e) => Some(e.kind),
            _ => None,
        }
    }

    /// SQL text associated with this error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(e) => e.sql.as_deref(),
            _ => None,
        }
    }

    /// Attach a column index to a type error; other errors pass through.
    #[must_use]
    pub fn at_column(self, column: usize) -> Self {
        match self {
            Error::Type(mut e) => {
                e.column.get_or_insert(column);
                Error::Type(e)
            }
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                write!(f, "{}: {}", e.kind, e.message)?;
                if let Some(sql) = &e.sql {
                    write!(f, " (sql: {sql})")?;
                }
                Ok(())
            }
            Error::Type(e) => write!(f, "{e}"),
            Error::Internal(e) => write!(f, "Internal error: {}", e.message),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::Prepare => f.write_str("Statement preparation failed"),
            QueryErrorKind::Constraint(kind) => write!(f, "{kind} constraint violated"),
            QueryErrorKind::Execution => f.write_str("Statement execution failed"),
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::NotNull => "NOT NULL",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::Other => "Database",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type error: expected {}, found {}", self.expected, self.found)?;
        if let Some(col) = self.column {
            write!(f, " at column {col}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|s| &**s as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_ref()
                .map(|s| &**s as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Error::Internal(err)
    }
}
