use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::config::DatabaseBackend;
use super::constants::{
    ENV_CONFIG, ENV_DATABASE_BACKEND, ENV_POSTGRES_URL, ENV_QUERY_LIMIT, ENV_SQLITE_PATH,
};
use crate::utils::time::parse_timestamp;

#[derive(Parser)]
#[command(name = "phoenix")]
#[command(version, about = "Query LLM traces with filter expressions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Span store backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_DATABASE_BACKEND, value_parser = parse_database_backend)]
    pub database_backend: Option<DatabaseBackend>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// SQLite database file
    #[arg(long, global = true, env = ENV_SQLITE_PATH)]
    pub sqlite_path: Option<PathBuf>,

    /// Default maximum number of spans per query
    #[arg(long, global = true, env = ENV_QUERY_LIMIT)]
    pub query_limit: Option<u64>,
}

fn parse_database_backend(s: &str) -> Result<DatabaseBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(DatabaseBackend::Sqlite),
        "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
        _ => Err(format!(
            "Invalid database backend '{}'. Valid: sqlite, postgres",
            s
        )),
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).ok_or_else(|| format!("Invalid timestamp '{}'. Expected RFC 3339", s))
}

/// An expression with an optional output label, written `[LABEL=]EXPR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExpr {
    pub label: Option<String>,
    pub expr: String,
}

/// `==` is never a label separator, so `a == 1` stays a bare expression.
fn split_label(s: &str) -> Option<(&str, &str)> {
    let (label, rest) = s.split_once('=')?;
    if rest.starts_with('=') || label.ends_with(['!', '<', '>']) {
        return None;
    }
    let label = label.trim();
    let is_label = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'));
    is_label.then_some((label, rest.trim()))
}

fn parse_labeled_expr(s: &str) -> Result<LabeledExpr, String> {
    let labeled = match split_label(s) {
        Some((label, expr)) => LabeledExpr {
            label: Some(label.to_string()),
            expr: expr.to_string(),
        },
        None => LabeledExpr {
            label: None,
            expr: s.trim().to_string(),
        },
    };
    if labeled.expr.is_empty() {
        return Err(format!("Missing expression in '{}'", s));
    }
    Ok(labeled)
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match split_label(s) {
        Some((label, value)) if !value.is_empty() => Ok((label.to_string(), value.to_string())),
        _ => Err(format!("Expected LABEL=VALUE, got '{}'", s)),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create or upgrade the span store schema
    Migrate,
    /// Run a span query and print the result as JSON records
    Query(QueryArgs),
    /// Compile a filter expression and print the SQL for every dialect
    Validate {
        /// Filter condition
        #[arg(long)]
        filter: String,

        /// Evaluation names the filter may reference
        #[arg(long = "eval-name")]
        eval_names: Vec<String>,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct QueryArgs {
    /// Project to query (default from config)
    #[arg(long)]
    pub project: Option<String>,

    /// Filter condition, e.g. `span_kind == 'LLM'`
    #[arg(long)]
    pub filter: Option<String>,

    /// Evaluation names the filter may reference
    #[arg(long = "eval-name")]
    pub eval_names: Vec<String>,

    /// Selected column as `[LABEL=]EXPR`
    #[arg(long, value_parser = parse_labeled_expr)]
    pub select: Vec<LabeledExpr>,

    /// Array attribute to explode into one row per element
    #[arg(long)]
    pub explode: Option<String>,

    /// Field extracted from each exploded element, as `LABEL=PATH`
    #[arg(long, value_parser = parse_pair)]
    pub explode_field: Vec<(String, String)>,

    /// Array attribute to concatenate into one value
    #[arg(long)]
    pub concat: Option<String>,

    /// Field concatenated across elements, as `LABEL=PATH`
    #[arg(long, value_parser = parse_pair)]
    pub concat_field: Vec<(String, String)>,

    /// Separator placed between concatenated values
    #[arg(long)]
    pub separator: Option<String>,

    /// Index column of the result
    #[arg(long)]
    pub index: Option<String>,

    /// Output column rename as `OLD=NEW`
    #[arg(long, value_parser = parse_pair)]
    pub rename: Vec<(String, String)>,

    /// Include spans starting at or after this time
    #[arg(long, value_parser = parse_time)]
    pub start: Option<DateTime<Utc>>,

    /// Include spans starting before this time
    #[arg(long, value_parser = parse_time)]
    pub end: Option<DateTime<Utc>>,

    /// Maximum number of spans
    #[arg(long)]
    pub limit: Option<u64>,

    /// Only spans without a stored parent
    #[arg(long)]
    pub root_spans_only: bool,

    /// Serialized query (JSON) used instead of the query flags
    #[arg(long)]
    pub spec: Option<PathBuf>,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub database_backend: Option<DatabaseBackend>,
    pub postgres_url: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub query_limit: Option<u64>,
}

impl Cli {
    fn into_parts(self) -> (CliConfig, Option<Commands>) {
        let config = CliConfig {
            config: self.config,
            database_backend: self.database_backend,
            postgres_url: self.postgres_url,
            sqlite_path: self.sqlite_path,
            query_limit: self.query_limit,
        };
        (config, self.command)
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    Cli::parse().into_parts()
}
