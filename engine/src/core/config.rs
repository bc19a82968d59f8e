//! Layered application configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Profile config (`~/.phoenix/phoenix.json`)
//! 3. Local `./phoenix.json`, or the file named by `--config` / `PHOENIX_CONFIG`
//! 4. CLI arguments (which include env var fallbacks via clap)

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CONCAT_SEPARATOR, DEFAULT_PROJECT_NAME,
    DEFAULT_QUERY_LIMIT,
};
use crate::utils::file::{expand_path, read_json};

/// Span store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Sqlite => write!(f, "sqlite"),
            DatabaseBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// File Config (JSON)
// =============================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SqliteFileConfig {
    /// Database file (default: `<data dir>/sqlite/phoenix.db`)
    pub path: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use PHOENIX_POSTGRES_URL env var)
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub backend: Option<DatabaseBackend>,
    pub sqlite: Option<SqliteFileConfig>,
    pub postgres: Option<PostgresFileConfig>,
}

/// Span query defaults (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    pub default_project: Option<String>,
    pub limit: Option<u64>,
    pub concat_separator: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub query: Option<QueryFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `target` with `value` when the latter is set.
fn merge_field<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let config: Self = read_json(path, "config file")?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Top-level keys this version does not understand
    fn unknown_fields(&self) -> Vec<&str> {
        match &self.extra {
            serde_json::Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn warn_unknown_fields(&self) {
        let unknown = self.unknown_fields();
        if !unknown.is_empty() {
            tracing::warn!(
                fields = %unknown.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(database) = other.database {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default);
            merge_field(&mut current.backend, database.backend);

            if let Some(sqlite) = database.sqlite {
                let current_sqlite = current.sqlite.get_or_insert_with(SqliteFileConfig::default);
                merge_field(&mut current_sqlite.path, sqlite.path);
            }

            if let Some(postgres) = database.postgres {
                let pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                merge_field(&mut pg.url, postgres.url);
                merge_field(&mut pg.max_connections, postgres.max_connections);
                merge_field(&mut pg.min_connections, postgres.min_connections);
                merge_field(&mut pg.acquire_timeout_secs, postgres.acquire_timeout_secs);
                merge_field(&mut pg.idle_timeout_secs, postgres.idle_timeout_secs);
                merge_field(&mut pg.max_lifetime_secs, postgres.max_lifetime_secs);
                merge_field(
                    &mut pg.statement_timeout_secs,
                    postgres.statement_timeout_secs,
                );
            }
        }

        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            tracing::trace!(query = ?query, "Merging query config");
            merge_field(&mut current.default_project, query.default_project);
            merge_field(&mut current.limit, query.limit);
            merge_field(&mut current.concat_separator, query.concat_separator);
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct SqliteConfig {
    /// Explicit database file; `None` places it under the data directory
    pub path: Option<PathBuf>,
}

/// PostgreSQL configuration (final/runtime)
///
/// Zero pool settings fall back to the defaults in [`super::constants`].
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// `Some(0)` disables the timeout
    pub statement_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub sqlite: SqliteConfig,
    pub postgres: PostgresConfig,
}

/// Defaults applied to span queries
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub default_project: String,
    pub limit: u64,
    pub concat_separator: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_project: DEFAULT_PROJECT_NAME.to_string(),
            limit: DEFAULT_QUERY_LIMIT,
            concat_separator: DEFAULT_CONCAT_SEPARATOR.to_string(),
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(file_config, cli);
        config.validate()?;

        tracing::debug!(
            backend = %config.database.backend,
            default_project = %config.query.default_project,
            limit = config.query.limit,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer defaults, file values and CLI/env overrides
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_database = file_config.database.unwrap_or_default();
        let file_sqlite = file_database.sqlite.unwrap_or_default();
        let file_postgres = file_database.postgres.unwrap_or_default();
        let file_query = file_config.query.unwrap_or_default();
        let defaults = QueryConfig::default();

        let backend = cli
            .database_backend
            .or(file_database.backend)
            .unwrap_or_default();

        let sqlite = SqliteConfig {
            path: cli
                .sqlite_path
                .clone()
                .or_else(|| file_sqlite.path.map(|p| expand_path(&p))),
        };

        let postgres = PostgresConfig {
            url: cli.postgres_url.clone().or(file_postgres.url),
            max_connections: file_postgres.max_connections.unwrap_or_default(),
            min_connections: file_postgres.min_connections.unwrap_or_default(),
            acquire_timeout_secs: file_postgres.acquire_timeout_secs.unwrap_or_default(),
            idle_timeout_secs: file_postgres.idle_timeout_secs.unwrap_or_default(),
            max_lifetime_secs: file_postgres.max_lifetime_secs.unwrap_or_default(),
            statement_timeout_secs: file_postgres.statement_timeout_secs,
        };

        let query = QueryConfig {
            default_project: file_query
                .default_project
                .unwrap_or(defaults.default_project),
            limit: cli.query_limit.or(file_query.limit).unwrap_or(defaults.limit),
            concat_separator: file_query
                .concat_separator
                .unwrap_or(defaults.concat_separator),
        };

        Self {
            database: DatabaseConfig {
                backend,
                sqlite,
                postgres,
            },
            query,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.database.backend == DatabaseBackend::Postgres
            && self
                .database
                .postgres
                .url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when backend is postgres"
            );
        }

        if self.query.limit == 0 {
            anyhow::bail!("Configuration error: query.limit must be greater than 0");
        }

        if self.query.default_project.trim().is_empty() {
            anyhow::bail!("Configuration error: query.default_project must not be empty");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.phoenix/phoenix.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
