//! SQLite error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = SqliteError::MigrationFailed {
            version: 1,
            name: "initial_schema".to_string(),
            error: "no such table: projects".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 1 (initial_schema) failed: no such table: projects"
        );
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let sqlite_err: SqliteError = io_err.into();
        assert!(sqlite_err.to_string().contains("read-only"));
    }
}
