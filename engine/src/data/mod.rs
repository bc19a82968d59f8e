//! Data storage layer
//!
//! Provides the span store for the application:
//! - `sqlite` - Embedded span store (default)
//! - `postgres` - Shared span store for multi-user deployments
//! - `sql` - Dialect-neutral SQL expressions and the per-backend dialects
//! - `spans` - Inserts for projects, traces, spans and annotations
//! - `error` - Unified error type for all backends

pub mod error;
pub mod postgres;
pub mod spans;
pub mod sql;
pub mod sqlite;

pub use error::DataError;
pub use postgres::PostgresService;
pub use sql::Backend;
pub use sqlite::SqliteService;

use std::sync::Arc;

use crate::core::config::{DatabaseBackend, DatabaseConfig};
use crate::core::storage::AppStorage;
use sql::SqlParams;

/// Span store service
///
/// Wraps the underlying backend-specific service (SQLite or PostgreSQL).
/// Services are stored as Arc so handles can be cloned cheaply.
#[derive(Clone)]
pub enum DatabaseService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for shared deployments)
    Postgres(Arc<PostgresService>),
}

impl DatabaseService {
    /// Initialize the configured backend and apply pending migrations
    ///
    /// SQLite uses the configured path, or a file under the data directory.
    pub async fn init(config: &DatabaseConfig, storage: &AppStorage) -> Result<Self, DataError> {
        match config.backend {
            DatabaseBackend::Sqlite => {
                let path = storage.sqlite_path(config.sqlite.path.as_deref());
                let service = SqliteService::init(&path).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            DatabaseBackend::Postgres => {
                let service = PostgresService::init(&config.postgres).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Private in-memory SQLite store with the schema applied
    pub async fn sqlite_in_memory() -> Result<Self, DataError> {
        let service = SqliteService::in_memory().await?;
        Ok(Self::Sqlite(Arc::new(service)))
    }

    /// Backend of the active connection pool
    pub fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }

    /// Run a statement whose columns are all text
    pub async fn fetch_text_rows(
        &self,
        sql: &str,
        params: &SqlParams,
    ) -> Result<Vec<Vec<Option<String>>>, DataError> {
        tracing::trace!(backend = %self.backend(), params = params.len(), sql, "Executing query");
        match self {
            Self::Sqlite(service) => Ok(service.fetch_text_rows(sql, params).await?),
            Self::Postgres(service) => Ok(service.fetch_text_rows(sql, params).await?),
        }
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(service) => service.close().await,
            Self::Postgres(service) => service.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SqliteConfig;

    #[tokio::test]
    async fn test_init_sqlite_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppStorage::init_for_test(dir.path().to_path_buf());
        let service = DatabaseService::init(&DatabaseConfig::default(), &storage)
            .await
            .unwrap();
        assert_eq!(service.backend(), Backend::Sqlite);
        assert!(dir.path().join("sqlite").join("phoenix.db").exists());
        service.close().await;
    }

    #[tokio::test]
    async fn test_init_sqlite_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.db");
        let config = DatabaseConfig {
            sqlite: SqliteConfig {
                path: Some(path.clone()),
            },
            ..Default::default()
        };
        let storage = AppStorage::init_for_test(dir.path().join("unused"));
        let service = DatabaseService::init(&config, &storage).await.unwrap();
        assert!(path.exists());
        service.close().await;
    }

    #[tokio::test]
    async fn test_init_postgres_without_url_fails() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Postgres,
            ..Default::default()
        };
        let storage = AppStorage::init_for_test(std::env::temp_dir());
        let err = DatabaseService::init(&config, &storage).await.err().unwrap();
        assert!(matches!(err, DataError::Config(_)));
        assert!(err.to_string().contains("PostgreSQL URL is required"));
    }

    #[tokio::test]
    async fn test_fetch_text_rows() {
        let service = DatabaseService::sqlite_in_memory().await.unwrap();
        let rows = service
            .fetch_text_rows("SELECT name FROM projects", &SqlParams::default())
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Some("default".to_string())]]);
    }
}
