//! Mapping engine errors onto `litemodel_core::Error`.

use litemodel_core::error::{
    ConnectionError, ConnectionErrorKind, ConstraintKind, QueryError, QueryErrorKind,
};
use litemodel_core::Error;
use rusqlite::ErrorCode;
use rusqlite::ffi;

/// Which step of a statement's life failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Prepare,
    Execute,
}

fn constraint_kind(extended_code: i32) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::PrimaryKey,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        _ => ConstraintKind::Other,
    }
}

/// Map a statement-level failure.
pub(crate) fn query_error(err: rusqlite::Error, sql: &str, phase: Phase) -> Error {
    let (kind, code) = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            let kind = if failure.code == ErrorCode::ConstraintViolation {
                QueryErrorKind::Constraint(constraint_kind(failure.extended_code))
            } else if phase == Phase::Prepare {
                QueryErrorKind::Prepare
            } else {
                QueryErrorKind::Execution
            };
            (kind, Some(failure.extended_code))
        }
        _ if phase == Phase::Prepare => (QueryErrorKind::Prepare, None),
        _ => (QueryErrorKind::Execution, None),
    };

    Error::Query(QueryError {
        kind,
        message: err.to_string(),
        sql: Some(sql.to_string()),
        code,
        source: Some(Box::new(err)),
    })
}

/// Map a failure while opening, configuring, or closing a handle.
pub(crate) fn connection_error(
    err: rusqlite::Error,
    kind: ConnectionErrorKind,
    context: &str,
) -> Error {
    Error::Connection(ConnectionError {
        kind,
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some(message.to_string()))
    }

    #[test]
    fn test_constraint_codes() {
        let err = query_error(
            failure(ffi::SQLITE_CONSTRAINT_UNIQUE, "UNIQUE constraint failed: students.name"),
            "INSERT INTO `students` (`name`) VALUES (?)",
            Phase::Execute,
        );
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
        assert_eq!(err.sql(), Some("INSERT INTO `students` (`name`) VALUES (?)"));

        let err = query_error(
            failure(ffi::SQLITE_CONSTRAINT_FOREIGNKEY, "FOREIGN KEY constraint failed"),
            "INSERT",
            Phase::Execute,
        );
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));

        let err = query_error(
            failure(ffi::SQLITE_CONSTRAINT_NOTNULL, "NOT NULL constraint failed"),
            "INSERT",
            Phase::Execute,
        );
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::NotNull));
    }

    #[test]
    fn test_phase_decides_kind() {
        let err = query_error(failure(ffi::SQLITE_ERROR, "no such table: x"), "SELECT", Phase::Prepare);
        match err {
            Error::Query(e) => {
                assert_eq!(e.kind, QueryErrorKind::Prepare);
                assert_eq!(e.code, Some(ffi::SQLITE_ERROR));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = query_error(failure(ffi::SQLITE_BUSY, "database is locked"), "UPDATE", Phase::Execute);
        assert!(!err.is_constraint_violation());
        assert!(err.to_string().starts_with("Statement execution failed"));
    }
}
