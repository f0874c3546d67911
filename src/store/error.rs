//! Error types for the transfer metadata store.

use std::fmt;

use thiserror::Error;

/// Typed classification of `sqlx` failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` reported busy/locked under concurrent access.
    BusyOrLocked,
    /// A constraint rejected the row.
    ConstraintViolation,
    /// No pooled connection became free in time.
    PoolTimeout,
    /// The pool was closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// Anything else.
    Other,
}

impl StoreDbErrorKind {
    /// Classifies a `sqlx` error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                let code = database_error.code();
                if matches!(
                    code.as_deref(),
                    Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
                ) {
                    Self::BusyOrLocked
                } else if database_error.is_check_violation()
                    || database_error.is_unique_violation()
                    || code
                        .as_deref()
                        .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT") || value == "275")
                {
                    Self::ConstraintViolation
                } else {
                    Self::Other
                }
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Errors from store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A database call failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Classification of the failure.
        kind: StoreDbErrorKind,
        /// Driver message.
        message: String,
    },

    /// No record has the given id.
    #[error("file record not found: id {0}")]
    RecordNotFound(i64),

    /// A size does not fit the database integer column.
    #[error("file size {0} is too large to store")]
    SizeOutOfRange(u64),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// The database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::RecordNotFound(_) | Self::SizeOutOfRange(_) => None,
        }
    }
}
