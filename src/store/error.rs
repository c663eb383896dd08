//! Error types for paper store operations.

use std::fmt;

use thiserror::Error;

use super::DownloadStatus;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// A UNIQUE constraint rejected the write.
    UniqueViolation,
    /// Other constraint failure (foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl StoreDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::UniqueViolation => "unique_violation",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    // 2067 = SQLITE_CONSTRAINT_UNIQUE, 1555 = SQLITE_CONSTRAINT_PRIMARYKEY
    if database_error.is_unique_violation() || matches!(code.as_deref(), Some("2067" | "1555")) {
        return StoreDbErrorKind::UniqueViolation;
    }

    if database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("unique constraint failed") {
        return StoreDbErrorKind::UniqueViolation;
    }
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return StoreDbErrorKind::BusyOrLocked;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur during paper store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The natural de-duplication key is already stored. Not a failure:
    /// callers treat it as a no-op.
    #[error("paper already stored: {dedup_key}")]
    AlreadyExists {
        /// Key that collided.
        dedup_key: String,
    },

    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// Paper not found.
    #[error(
        "paper not found: id {0}\n  Suggestion: The record may not exist yet; run `paper-harvest stats` to inspect the store"
    )]
    ItemNotFound(i64),

    /// A record is missing a mandatory field.
    #[error("invalid paper record: {reason}")]
    InvalidRecord {
        /// What is wrong with the record.
        reason: String,
    },

    /// The requested status change is not a legal transition.
    #[error("paper {id}: cannot move download status from {from} to {to}")]
    InvalidTransition {
        /// Paper id.
        id: i64,
        /// Current stored status.
        from: DownloadStatus,
        /// Requested status.
        to: DownloadStatus,
    },

    /// Unrecognized status text.
    #[error(
        "invalid status '{0}'\n  Suggestion: Use one of: pending, downloading, completed, failed"
    )]
    InvalidStatus(String),
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
    /// Creates an `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true for the signaled duplicate no-op.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
