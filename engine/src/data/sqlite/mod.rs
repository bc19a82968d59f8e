//! SQLite database service
//!
//! Embedded span store for local use with:
//! - WAL mode for concurrent reads during writes
//! - In-memory temp storage for fast queries
//!
//! All schema definitions and migrations are managed here.

pub mod error;
mod migrations;
pub mod schema;

pub use error::SqliteError;
pub use sqlx::SqlitePool;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Row, Sqlite};
use tracing::log::LevelFilter;

use crate::core::constants::{SQLITE_BUSY_TIMEOUT_SECS, SQLITE_CACHE_SIZE, SQLITE_MAX_CONNECTIONS};
use crate::data::sql::{SqlParams, SqlValue};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite database service
///
/// Handles database initialization and connection pooling.
/// Should be created once at startup and shared.
pub struct SqliteService {
    pool: SqlitePool,
}

impl SqliteService {
    /// Initialize the database service
    ///
    /// Creates the database file if it doesn't exist, configures connection
    /// options with optimized pragmas, and runs any pending migrations.
    pub async fn init(db_path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS))
            .pragma("cache_size", SQLITE_CACHE_SIZE)
            .pragma("temp_store", "MEMORY")
            .log_statements(LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;

        tracing::debug!(path = %db_path.display(), "SqliteService initialized");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self, SqliteError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .log_statements(LevelFilter::Trace);

        // A single connection that never idles out keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        tracing::debug!("In-memory SqliteService initialized");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a statement whose columns are all text, returning raw values.
    pub async fn fetch_text_rows(
        &self,
        sql: &str,
        params: &SqlParams,
    ) -> Result<Vec<Vec<Option<String>>>, SqliteError> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get_unchecked::<Option<String>, _>(i))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(SqliteError::from)
            })
            .collect()
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
    }
}

fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &'q SqlParams) -> SqliteQuery<'q> {
    for value in &params.values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            // SQLite has no arrays; a JSON array works with json_each
            SqlValue::TextArray(items) => {
                query.bind(serde_json::Value::from(items.clone()).to_string())
            }
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_text_rows_binds_in_order() {
        let service = SqliteService::in_memory().await.unwrap();
        let params = SqlParams {
            values: vec![
                SqlValue::Text("a".into()),
                SqlValue::Int(2),
                SqlValue::Null,
            ],
        };
        let rows = service
            .fetch_text_rows("SELECT json_quote(?), json_quote(?), ?", &params)
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![Some("\"a\"".to_string()), Some("2".to_string()), None]]
        );
    }

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("phoenix.db");
        let service = SqliteService::init(&path).await.unwrap();
        assert!(path.exists());
        service.close().await;
    }
}
