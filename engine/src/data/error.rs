//! Span store errors, tagged with the backend that raised them

use thiserror::Error;

use super::postgres::PostgresError;
use super::sql::Backend;
use super::sqlite::SqliteError;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("{backend} query failed: {source}")]
    Query {
        backend: Backend,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: Backend,
        version: i32,
        name: String,
        error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),
}

impl DataError {
    pub fn from_sqlite(source: sqlx::Error) -> Self {
        Self::Query {
            backend: Backend::Sqlite,
            source,
        }
    }

    pub fn from_postgres(source: sqlx::Error) -> Self {
        Self::Query {
            backend: Backend::Postgres,
            source,
        }
    }

    /// Backend that raised the error, when one did.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Self::Query { backend, .. } | Self::MigrationFailed { backend, .. } => Some(*backend),
            Self::Config(_) | Self::Io(_) | Self::ProjectNotFound(_) => None,
        }
    }
}

impl From<SqliteError> for DataError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Database(e) => Self::from_sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: Backend::Sqlite,
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
        }
    }
}

impl From<PostgresError> for DataError {
    fn from(e: PostgresError) -> Self {
        match e {
            PostgresError::Database(e) => Self::from_postgres(e),
            PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: Backend::Postgres,
                version,
                name,
                error,
            },
            PostgresError::Config(msg) => Self::Config(msg),
        }
    }
}
