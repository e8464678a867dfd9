//! Error types for the tracker store.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Retryability flags for callers deciding whether to try again
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! "Not found" is not an error for repositories: lookups return `Option`
//! or an empty `Vec`. [`Error::NotFound`] only exists for the CLI, where a
//! missing row is a user-facing failure.

use rusqlite::ErrorCode as SqliteCode;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    NotInitialized,
    StorageUnavailable,
    MigrationFailure,
    SchemaTooNew,
    DatabaseError,

    // Not Found (exit 3)
    NotFound,

    // Validation (exit 4)
    ConstraintViolation,
    InvalidArgument,


    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::MigrationFailure => "MIGRATION_FAILURE",
            Self::SchemaTooNew => "SCHEMA_TOO_NEW",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (2-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotInitialized
            | Self::StorageUnavailable
            | Self::MigrationFailure
            | Self::SchemaTooNew
            | Self::DatabaseError => 2,
            Self::NotFound => 3,
            Self::ConstraintViolation | Self::InvalidArgument => 4,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller may retry with corrected input.
    ///
    /// The store itself never retries. Storage and migration failures are
    /// not retryable here; a retry policy belongs to the calling collaborator.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument | Self::ConstraintViolation)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: no store found")]
    NotInitialized,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Migration to schema version {version} failed: {source}")]
    MigrationFailure {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store is at schema version {found}, newer than the latest known version {latest}")]
    SchemaTooNew { found: u32, latest: u32 },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
        /// Stored ids close to the one asked for.
        suggestions: Vec<String>,
    },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(SqliteCode::ConstraintViolation) => Self::ConstraintViolation(err.to_string()),
            Some(
                SqliteCode::CannotOpen
                | SqliteCode::PermissionDenied
                | SqliteCode::ReadOnly
                | SqliteCode::DiskFull
                | SqliteCode::SystemIoFailure
                | SqliteCode::NotADatabase,
            ) => Self::StorageUnavailable(err.to_string()),
            _ => Self::Database(err),
        }
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::StorageUnavailable(_) | Self::Pool(_) => ErrorCode::StorageUnavailable,
            Self::MigrationFailure { .. } => ErrorCode::MigrationFailure,
            Self::SchemaTooNew { .. } => ErrorCode::SchemaTooNew,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ConstraintViolation(_) => ErrorCode::ConstraintViolation,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some(
                "Run `tagstore migrate` to create the store, or pass --db <path> / set TAGSTORE_DB"
                    .to_string(),
            ),

            Self::StorageUnavailable(_) | Self::Pool(_) => Some(
                "Check that the database file is readable and writable and the disk is not full"
                    .to_string(),
            ),

            Self::MigrationFailure { version, .. } => Some(format!(
                "The store was left at the version before {version}. \
                 Restore a backup or report the failing migration."
            )),

            Self::SchemaTooNew { .. } => Some(
                "This database was written by a newer build. Upgrade tagstore to open it."
                    .to_string(),
            ),

            Self::NotFound {
                entity,
                suggestions,
                ..
            } => Some(if suggestions.is_empty() {
                format!("No such {entity}. Use the matching `list` command to see stored ids.")
            } else {
                format!("Did you mean: {}?", suggestions.join(", "))
            }),

            Self::InvalidArgument(msg) if msg.contains("unknown setting") => Some(
                "Valid keys: use_dark_theme, anisette_server_url, fmd_server_url, fmd_email, \
                 fmd_password, language, enable_debug_data"
                    .to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("URL") => Some(
                "Server URLs must be http(s) base URLs without a path, e.g. https://fmd.example.org"
                    .to_string(),
            ),

            Self::ConstraintViolation(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_constraint_errors_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY NOT NULL, v TEXT NOT NULL)")
            .unwrap();
        let err: Error = conn
            .execute("INSERT INTO t (id, v) VALUES ('a', NULL)", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_other_sqlite_errors_stay_database_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let err: Error = conn.execute("SELECT * FROM missing", []).unwrap_err().into();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(err.error_code(), ErrorCode::DatabaseError);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::SchemaTooNew { found: 9, latest: 3 };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "SCHEMA_TOO_NEW");
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_not_found_hint_lists_suggestions() {
        let err = Error::NotFound {
            entity: "device",
            id: "abd".to_string(),
            suggestions: vec!["abc".to_string()],
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.hint().as_deref(), Some("Did you mean: abc?"));
    }
}
