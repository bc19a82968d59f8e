//! Core application

use anyhow::{Context, Result};

use crate::core::cli::{self, CliConfig, Commands, QueryArgs};
use crate::core::config::{AppConfig, QueryConfig};
use crate::core::constants::{DEFAULT_LOG_FILTER, ENV_LOG};
use crate::core::storage::AppStorage;
use crate::data::sql::{Backend, SqlParams};
use crate::data::DatabaseService;
use crate::domain::traces::dsl::{QueryParams, QuerySpec, SpanFilter, SpanQuery};
use crate::utils::file::read_json;

pub struct CoreApp {
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: DatabaseService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command.unwrap_or(Commands::Migrate) {
            Commands::Validate { filter, eval_names } => Self::validate_filter(&filter, &eval_names),
            Commands::Migrate => {
                let app = Self::init(&cli_config).await?;
                tracing::info!(
                    backend = %app.database.backend(),
                    data_dir = %app.storage.data_dir().display(),
                    "Span store is up to date"
                );
                app.database.close().await;
                Ok(())
            }
            Commands::Query(args) => {
                let app = Self::init(&cli_config).await?;
                let result = app.run_query(&args).await;
                app.database.close().await;
                result
            }
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = DatabaseService::init(&config.database, &storage)
            .await
            .context("Failed to open span store")?;

        Ok(Self {
            config,
            storage,
            database,
        })
    }

    async fn run_query(&self, args: &QueryArgs) -> Result<()> {
        let query = build_query(args, &self.config.query)?;
        let params = query_params(args, &self.config.query);
        tracing::debug!(
            project = %params.project_name,
            limit = params.limit,
            simple = query.is_simple(),
            "Running span query"
        );

        let frame = query.execute(&self.database, &params).await?;
        tracing::info!(rows = frame.len(), columns = frame.columns.len(), "Query finished");
        println!("{}", serde_json::to_string_pretty(&frame.records())?);
        Ok(())
    }

    /// Print the SQL a filter compiles to on every backend.
    fn validate_filter(condition: &str, eval_names: &[String]) -> Result<()> {
        let names = (!eval_names.is_empty()).then_some(eval_names);
        let filter = SpanFilter::new(condition, names)?;
        for backend in [Backend::Sqlite, Backend::Postgres] {
            let (sql, params) = filter.render(backend.dialect());
            println!("-- {backend}");
            println!("{sql};");
            print_params(&params);
        }
        Ok(())
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

fn print_params(params: &SqlParams) {
    for (i, value) in params.values.iter().enumerate() {
        println!("--   ${} = {:?}", i + 1, value);
    }
}

/// Assemble a query from command line flags, or from a serialized spec file.
pub(crate) fn build_query(args: &QueryArgs, config: &QueryConfig) -> Result<SpanQuery> {
    let eval_names = (!args.eval_names.is_empty()).then_some(args.eval_names.as_slice());

    if let Some(path) = &args.spec {
        let spec: QuerySpec = read_json(path, "query spec")?;
        return Ok(SpanQuery::from_spec(&spec, eval_names)?);
    }

    let mut query = SpanQuery::new().with_concat_separator(
        args.separator
            .as_deref()
            .unwrap_or(&config.concat_separator),
    );
    if let Some(names) = eval_names {
        query = query.with_valid_eval_names(names.iter().cloned())?;
    }
    for selected in &args.select {
        query = match &selected.label {
            Some(label) => query.select_as(&[(label.as_str(), selected.expr.as_str())])?,
            None => query.select([selected.expr.as_str()])?,
        };
    }
    if let Some(condition) = &args.filter {
        query = query.filter(condition)?;
    }
    if let Some(key) = &args.explode {
        query = query.explode(key, &pairs(&args.explode_field))?;
    }
    if let Some(key) = &args.concat {
        query = query.concat(key, &pairs(&args.concat_field))?;
    }
    if let Some(index) = &args.index {
        query = query.with_index(index)?;
    }
    Ok(query.rename(&pairs(&args.rename)))
}

/// Execution parameters from flags, falling back to configured defaults.
pub(crate) fn query_params(args: &QueryArgs, config: &QueryConfig) -> QueryParams {
    QueryParams {
        project_name: args
            .project
            .clone()
            .unwrap_or_else(|| config.default_project.clone()),
        start_time: args.start,
        end_time: args.end,
        limit: args.limit.unwrap_or(config.limit),
        root_spans_only: args.root_spans_only,
    }
}

fn pairs(values: &[(String, String)]) -> Vec<(&str, &str)> {
    values
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cli::LabeledExpr;
    use std::io::Write;

    fn config() -> QueryConfig {
        QueryConfig {
            default_project: "evals".to_string(),
            limit: 25,
            concat_separator: " | ".to_string(),
        }
    }

    #[test]
    fn test_build_query_from_flags() {
        let args = QueryArgs {
            filter: Some("evals['QA'].label == 'correct'".into()),
            eval_names: vec!["QA".into()],
            select: vec![
                LabeledExpr {
                    label: None,
                    expr: "input.value".into(),
                },
                LabeledExpr {
                    label: Some("kind".into()),
                    expr: "span_kind".into(),
                },
            ],
            concat: Some("retrieval.documents".into()),
            concat_field: vec![("reference".into(), "document.content".into())],
            rename: vec![("kind".into(), "span kind".into())],
            ..Default::default()
        };
        let spec = build_query(&args, &config()).unwrap().to_spec();

        let labels: Vec<&str> = spec.select.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["input.value", "kind"]);
        assert_eq!(
            spec.filter.unwrap().condition,
            "evals['QA'].label == 'correct'"
        );
        assert_eq!(spec.concat.unwrap().separator, " | ");
        assert_eq!(
            spec.rename,
            vec![("kind".to_string(), "span kind".to_string())]
        );
    }

    #[test]
    fn test_unknown_eval_name_is_rejected() {
        let args = QueryArgs {
            filter: Some("evals['QA'].score > 0".into()),
            eval_names: vec!["Hallucination".into()],
            ..Default::default()
        };
        assert!(build_query(&args, &config()).is_err());
    }

    #[test]
    fn test_build_query_from_spec_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"explode": {{"key": "retrieval.documents", "kwargs": {{"score": "document.score"}}}}}}"#
        )
        .unwrap();
        let args = QueryArgs {
            spec: Some(file.path().to_path_buf()),
            filter: Some("ignored ==".into()),
            ..Default::default()
        };
        let spec = build_query(&args, &config()).unwrap().to_spec();
        let explode = spec.explode.unwrap();
        assert_eq!(explode.key, "retrieval.documents");
        assert_eq!(explode.primary_index_key, "context.span_id");
        assert!(spec.filter.is_none());
    }

    #[test]
    fn test_query_params_fall_back_to_config() {
        let params = query_params(&QueryArgs::default(), &config());
        assert_eq!(params.project_name, "evals");
        assert_eq!(params.limit, 25);

        let args = QueryArgs {
            project: Some("default".into()),
            limit: Some(3),
            root_spans_only: true,
            ..Default::default()
        };
        let params = query_params(&args, &config());
        assert_eq!(params.project_name, "default");
        assert_eq!(params.limit, 3);
        assert!(params.root_spans_only);
    }

    #[test]
    fn test_validate_filter() {
        assert!(CoreApp::validate_filter("span_kind == 'LLM'", &[]).is_ok());
        assert!(CoreApp::validate_filter("span_kind ==", &[]).is_err());
    }
}
