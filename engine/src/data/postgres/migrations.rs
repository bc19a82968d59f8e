//! PostgreSQL schema versioning

use sqlx::PgPool;

use super::error::PostgresError;
use super::schema::{DEFAULT_DATA, SCHEMA, SCHEMA_VERSION};

/// Bring the span store schema up to `SCHEMA_VERSION`
pub async fn run_migrations(pool: &PgPool) -> Result<(), PostgresError> {
    let has_version_table: bool =
        sqlx::query_scalar("SELECT to_regclass('schema_version') IS NOT NULL")
            .fetch_one(pool)
            .await?;

    let current: i32 = if has_version_table {
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0)
    } else {
        0
    };

    if current > SCHEMA_VERSION {
        tracing::warn!(
            current,
            supported = SCHEMA_VERSION,
            "PostgreSQL span store was created by a newer version"
        );
    } else if current < SCHEMA_VERSION {
        tracing::debug!(from = current, to = SCHEMA_VERSION, "Migrating PostgreSQL span store");
        apply_schema(pool).await?;
    } else {
        tracing::debug!(version = current, "PostgreSQL span store is up to date");
    }
    Ok(())
}

async fn apply_schema(pool: &PgPool) -> Result<(), PostgresError> {
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(|e| PostgresError::MigrationFailed {
            version: SCHEMA_VERSION,
            name: "initial_schema".to_string(),
            error: e.to_string(),
        })?;
    sqlx::raw_sql(DEFAULT_DATA).execute(&mut *tx).await?;

    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description) \
         VALUES (1, $1, $2, 'Span store schema') \
         ON CONFLICT (id) DO UPDATE SET version = EXCLUDED.version, applied_at = EXCLUDED.applied_at",
    )
    .bind(SCHEMA_VERSION)
    .bind(chrono::Utc::now().timestamp_micros())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
