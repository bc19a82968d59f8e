//! Span store writes
//!
//! Inserts for projects, traces, spans and span annotations on either
//! backend. Timestamps are microseconds since the Unix epoch. JSON columns
//! are bound as text; PostgreSQL casts them to `jsonb`.

use serde_json::{Map, Value as JsonValue};

use super::sql::Backend;
use super::{DataError, DatabaseService};
use crate::domain::traces::attributes::{DEFAULT_SEPARATOR, unflatten};

/// Bind the same values on whichever backend `$db` holds and return the new id.
macro_rules! fetch_id {
    ($db:expr, $sql:expr, $($value:expr),+ $(,)?) => {
        match $db {
            DatabaseService::Sqlite(service) => sqlx::query_scalar::<_, i64>($sql)
                $(.bind($value))+
                .fetch_one(service.pool())
                .await
                .map_err(DataError::from_sqlite),
            DatabaseService::Postgres(service) => sqlx::query_scalar::<_, i64>($sql)
                $(.bind($value))+
                .fetch_one(service.pool())
                .await
                .map_err(DataError::from_postgres),
        }
    };
}

/// `INSERT ... RETURNING id` with dialect placeholders.
fn insert_sql(backend: Backend, table: &str, columns: &[&str], json_columns: &[&str]) -> String {
    let dialect = backend.dialect();
    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let placeholder = dialect.placeholder(i + 1);
            if backend == Backend::Postgres && json_columns.contains(column) {
                format!("{placeholder}::jsonb")
            } else {
                placeholder
            }
        })
        .collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING id",
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[derive(Debug, Clone)]
pub struct NewTrace {
    pub trace_id: String,
    pub project_rowid: i64,
    pub start_time: i64,
    pub end_time: i64,
}

/// A span row to insert.
#[derive(Debug, Clone)]
pub struct NewSpan {
    pub span_id: String,
    pub trace_rowid: i64,
    pub parent_id: Option<String>,
    pub name: String,
    pub span_kind: String,
    pub start_time: i64,
    pub end_time: i64,
    pub attributes: JsonValue,
    pub events: JsonValue,
    pub status_code: String,
    pub status_message: String,
    pub cumulative_error_count: i64,
    pub cumulative_llm_token_count_prompt: i64,
    pub cumulative_llm_token_count_completion: i64,
    pub llm_token_count_prompt: Option<i64>,
    pub llm_token_count_completion: Option<i64>,
}

impl NewSpan {
    pub fn new(
        span_id: impl Into<String>,
        trace_rowid: i64,
        name: impl Into<String>,
        span_kind: impl Into<String>,
        start_time: i64,
        end_time: i64,
    ) -> Self {
        Self {
            span_id: span_id.into(),
            trace_rowid,
            parent_id: None,
            name: name.into(),
            span_kind: span_kind.into(),
            start_time,
            end_time,
            attributes: JsonValue::Object(Map::new()),
            events: JsonValue::Array(Vec::new()),
            status_code: "UNSET".to_string(),
            status_message: String::new(),
            cumulative_error_count: 0,
            cumulative_llm_token_count_prompt: 0,
            cumulative_llm_token_count_completion: 0,
            llm_token_count_prompt: None,
            llm_token_count_completion: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attributes(mut self, attributes: JsonValue) -> Self {
        self.attributes = attributes;
        self
    }

    /// Rebuild the attribute tree from dotted `(path, value)` pairs.
    pub fn with_flat_attributes<I, K>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: AsRef<str>,
    {
        self.with_attributes(JsonValue::Object(unflatten(pairs, DEFAULT_SEPARATOR)))
    }

    pub fn with_status(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.status_code = code.into();
        self.status_message = message.into();
        self
    }

    pub fn with_token_counts(mut self, prompt: i64, completion: i64) -> Self {
        self.llm_token_count_prompt = Some(prompt);
        self.llm_token_count_completion = Some(completion);
        self.cumulative_llm_token_count_prompt = prompt;
        self.cumulative_llm_token_count_completion = completion;
        self
    }
}

/// An evaluation result attached to a span.
#[derive(Debug, Clone)]
pub struct NewSpanAnnotation {
    pub span_rowid: i64,
    pub name: String,
    pub label: Option<String>,
    pub score: Option<f64>,
    pub explanation: Option<String>,
    pub metadata: JsonValue,
    pub annotator_kind: String,
}

impl NewSpanAnnotation {
    pub fn new(span_rowid: i64, name: impl Into<String>) -> Self {
        Self {
            span_rowid,
            name: name.into(),
            label: None,
            score: None,
            explanation: None,
            metadata: JsonValue::Object(Map::new()),
            annotator_kind: "LLM".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

pub async fn insert_project(
    db: &DatabaseService,
    name: &str,
    description: Option<&str>,
) -> Result<i64, DataError> {
    let sql = insert_sql(
        db.backend(),
        "projects",
        &["name", "description", "created_at"],
        &[],
    );
    let now = chrono::Utc::now().timestamp_micros();
    let id = fetch_id!(db, &sql, name, description, now)?;
    tracing::debug!(project = name, id, "Inserted project");
    Ok(id)
}

/// Row id of a project by name.
pub async fn project_rowid(db: &DatabaseService, name: &str) -> Result<i64, DataError> {
    let sql = format!(
        "SELECT id FROM projects WHERE name = {}",
        db.backend().dialect().placeholder(1)
    );
    let id = match db {
        DatabaseService::Sqlite(service) => sqlx::query_scalar::<_, i64>(&sql)
            .bind(name)
            .fetch_optional(service.pool())
            .await
            .map_err(DataError::from_sqlite)?,
        DatabaseService::Postgres(service) => sqlx::query_scalar::<_, i64>(&sql)
            .bind(name)
            .fetch_optional(service.pool())
            .await
            .map_err(DataError::from_postgres)?,
    };
    id.ok_or_else(|| DataError::ProjectNotFound(name.to_string()))
}

pub async fn insert_trace(db: &DatabaseService, trace: &NewTrace) -> Result<i64, DataError> {
    let sql = insert_sql(
        db.backend(),
        "traces",
        &["trace_id", "project_rowid", "start_time", "end_time"],
        &[],
    );
    fetch_id!(
        db,
        &sql,
        trace.trace_id.as_str(),
        trace.project_rowid,
        trace.start_time,
        trace.end_time,
    )
}

pub async fn insert_span(db: &DatabaseService, span: &NewSpan) -> Result<i64, DataError> {
    let sql = insert_sql(
        db.backend(),
        "spans",
        &[
            "span_id",
            "trace_rowid",
            "parent_id",
            "name",
            "span_kind",
            "start_time",
            "end_time",
            "attributes",
            "events",
            "status_code",
            "status_message",
            "cumulative_error_count",
            "cumulative_llm_token_count_prompt",
            "cumulative_llm_token_count_completion",
            "llm_token_count_prompt",
            "llm_token_count_completion",
        ],
        &["attributes", "events"],
    );
    let attributes = span.attributes.to_string();
    let events = span.events.to_string();
    let id = fetch_id!(
        db,
        &sql,
        span.span_id.as_str(),
        span.trace_rowid,
        span.parent_id.as_deref(),
        span.name.as_str(),
        span.span_kind.as_str(),
        span.start_time,
        span.end_time,
        attributes.as_str(),
        events.as_str(),
        span.status_code.as_str(),
        span.status_message.as_str(),
        span.cumulative_error_count,
        span.cumulative_llm_token_count_prompt,
        span.cumulative_llm_token_count_completion,
        span.llm_token_count_prompt,
        span.llm_token_count_completion,
    )?;
    tracing::trace!(span_id = %span.span_id, id, "Inserted span");
    Ok(id)
}

pub async fn insert_span_annotation(
    db: &DatabaseService,
    annotation: &NewSpanAnnotation,
) -> Result<i64, DataError> {
    let sql = insert_sql(
        db.backend(),
        "span_annotations",
        &[
            "span_rowid",
            "name",
            "label",
            "score",
            "explanation",
            "metadata",
            "annotator_kind",
        ],
        &["metadata"],
    );
    let metadata = annotation.metadata.to_string();
    fetch_id!(
        db,
        &sql,
        annotation.span_rowid,
        annotation.name.as_str(),
        annotation.label.as_deref(),
        annotation.score,
        annotation.explanation.as_deref(),
        metadata.as_str(),
        annotation.annotator_kind.as_str(),
    )
}
