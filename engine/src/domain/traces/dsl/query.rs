//! Span queries
//!
//! A [`SpanQuery`] composes projections, a filter, and at most one explode
//! and one concat over a JSON array attribute. Execution issues one base
//! statement over the matching spans. Backends with ordered array expansion
//! run explode and concat in SQL as separate statements over the same span
//! selection; otherwise the arrays are fetched whole and expanded here, in
//! array order. Both paths produce the same [`SpanFrame`].

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::columns::{ExprType, SpanColumn};
use super::error::{DslError, QueryError};
use super::filter::{FilterSpec, SpanFilter};
use super::frame::SpanFrame;
use super::projector::Projector;
use crate::core::constants::{
    DEFAULT_CONCAT_SEPARATOR, DEFAULT_PROJECT_NAME, DEFAULT_QUERY_LIMIT, DEFAULT_SPAN_INDEX,
};
use crate::data::DatabaseService;
use crate::data::sql::{
    Backend, CompareOp, Join, JoinKind, JsonCast, PathKey, SelectStatement, SqlExpr, SqlParams,
    SqlValue,
};
use crate::domain::traces::attributes::{FlattenOptions, flatten};
use crate::utils::time::micros_to_rfc3339;

/// Result labels renamed to their dotted form before user renames.
const LEGACY_LABELS: &[(&str, &str)] = &[
    ("span_id", "context.span_id"),
    ("trace_id", "context.trace_id"),
];

/// Columns returned when a query selects nothing.
const DEFAULT_COLUMNS: &[(&str, SpanColumn)] = &[
    ("name", SpanColumn::Name),
    ("span_kind", SpanColumn::SpanKind),
    ("parent_id", SpanColumn::ParentId),
    ("start_time", SpanColumn::StartTime),
    ("end_time", SpanColumn::EndTime),
    ("status_code", SpanColumn::StatusCode),
    ("status_message", SpanColumn::StatusMessage),
    ("events", SpanColumn::Events),
    ("context.span_id", SpanColumn::SpanId),
    ("context.trace_id", SpanColumn::TraceId),
    ("attributes", SpanColumn::Attributes),
];

/// Name of the CTE holding the selected spans on the ordered-unnest path.
const BASE_CTE: &str = "base";
const BASE_ROWID: &str = "span_rowid";
const BASE_START: &str = "span_start_time";
const BASE_ARRAY: &str = "span_array";
const ELEMENT_ALIAS: &str = "elems";

// ============================================================================
// Execution parameters
// ============================================================================

/// Which spans a query runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub project_name: String,
    /// Inclusive lower bound on span start time
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive upper bound on span start time
    pub end_time: Option<DateTime<Utc>>,
    /// Spans fetched before explosion
    pub limit: u64,
    pub root_spans_only: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            start_time: None,
            end_time: None,
            limit: DEFAULT_QUERY_LIMIT,
            root_spans_only: false,
        }
    }
}

// ============================================================================
// Array operations
// ============================================================================

/// Path inside one array element, e.g. `document.score`.
#[derive(Debug, Clone, PartialEq)]
struct ElementPath {
    source: String,
    keys: Vec<PathKey>,
}

impl ElementPath {
    fn parse(source: &str) -> Result<Self, DslError> {
        let source = source.trim();
        let keys = source
            .split('.')
            .map(|segment| {
                let segment = segment.trim();
                if segment.is_empty() || segment.contains('"') {
                    return Err(DslError::InvalidArgument(format!(
                        "invalid element path `{source}`"
                    )));
                }
                if segment.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(index) = segment.parse::<i64>()
                {
                    return Ok(PathKey::Index(index));
                }
                Ok(PathKey::key(segment))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            keys,
        })
    }

    /// Value at this path, stepping through objects and arrays.
    fn lookup<'a>(&self, element: &'a JsonValue) -> Option<&'a JsonValue> {
        self.keys.iter().try_fold(element, |current, key| match (key, current) {
            (PathKey::Key(key), JsonValue::Object(map)) => map.get(key),
            (PathKey::Index(index), JsonValue::Array(items)) => {
                usize::try_from(*index).ok().and_then(|i| items.get(i))
            }
            (PathKey::Index(index), JsonValue::Object(map)) => map.get(&index.to_string()),
            _ => None,
        })
    }
}

fn parse_kwargs(kwargs: &[(&str, &str)]) -> Result<Vec<(String, ElementPath)>, DslError> {
    kwargs
        .iter()
        .map(|(label, path)| {
            let label = label.trim();
            if label.is_empty() {
                return Err(DslError::InvalidArgument(
                    "field label must not be empty".to_string(),
                ));
            }
            Ok((label.to_string(), ElementPath::parse(path)?))
        })
        .collect()
}

/// The JSON array addressed by `key`.
fn array_projection(key: &str) -> Result<(Projector, SqlExpr), DslError> {
    let projector = Projector::new(key)?;
    let array = projector.array().ok_or_else(|| {
        DslError::InvalidArgument(format!("`{key}` does not address an attribute array"))
    })?;
    Ok((projector, array))
}

fn position_label(key: &str) -> &'static str {
    match key {
        "retrieval.documents" => "document_position",
        "llm.input_messages" | "llm.output_messages" => "message_position",
        _ => "position",
    }
}

/// One row per element of an array attribute.
#[derive(Debug, Clone, PartialEq)]
struct Explosion {
    key: String,
    array: SqlExpr,
    kwargs: Vec<(String, ElementPath)>,
    primary_index: Projector,
    position_label: String,
}

impl Explosion {
    fn new(key: &str, kwargs: &[(&str, &str)], primary_index: Projector) -> Result<Self, DslError> {
        let (projector, array) = array_projection(key)?;
        let key = projector.expression().to_string();
        Ok(Self {
            position_label: position_label(&key).to_string(),
            key,
            array,
            kwargs: parse_kwargs(kwargs)?,
            primary_index,
        })
    }

    /// Fields of each object element, keyed by position.
    fn expand(&self, array: &JsonValue) -> Vec<(i64, Vec<(String, JsonValue)>)> {
        let Some(items) = array.as_array() else {
            return Vec::new();
        };
        let options = FlattenOptions::default();
        items
            .iter()
            .enumerate()
            .filter(|(_, element)| element.is_object())
            .map(|(position, element)| {
                let fields = if self.kwargs.is_empty() {
                    flatten(element, &options).collect()
                } else {
                    self.kwargs
                        .iter()
                        .map(|(label, path)| {
                            let value = path.lookup(element).cloned().unwrap_or(JsonValue::Null);
                            (label.clone(), value)
                        })
                        .collect()
                };
                (position as i64, fields)
            })
            .collect()
    }
}

/// Array attribute values joined into one string per span.
#[derive(Debug, Clone, PartialEq)]
struct Concatenation {
    key: String,
    array: SqlExpr,
    kwargs: Vec<(String, ElementPath)>,
    separator: String,
}

impl Concatenation {
    fn new(key: &str, kwargs: &[(&str, &str)], separator: &str) -> Result<Self, DslError> {
        let (projector, array) = array_projection(key)?;
        Ok(Self {
            key: projector.expression().to_string(),
            array,
            kwargs: parse_kwargs(kwargs)?,
            separator: separator.to_string(),
        })
    }

    /// Joined values per label, or `None` when the array is missing or empty.
    fn join(&self, array: &JsonValue) -> Option<Vec<(String, JsonValue)>> {
        let items = array.as_array().filter(|items| !items.is_empty())?;
        let joined = |values: Vec<&JsonValue>| {
            let parts: Vec<String> = values
                .into_iter()
                .filter(|value| !value.is_null())
                .map(|value| match value {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            if parts.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(parts.join(&self.separator))
            }
        };

        if self.kwargs.is_empty() {
            return Some(vec![(self.key.clone(), joined(items.iter().collect()))]);
        }
        Some(
            self.kwargs
                .iter()
                .map(|(label, path)| {
                    let values = items.iter().filter_map(|item| path.lookup(item)).collect();
                    (label.clone(), joined(values))
                })
                .collect(),
        )
    }

    fn labels(&self) -> Vec<String> {
        if self.kwargs.is_empty() {
            vec![self.key.clone()]
        } else {
            self.kwargs.iter().map(|(label, _)| label.clone()).collect()
        }
    }
}

// ============================================================================
// Serialized form
// ============================================================================

/// Ordered `label -> value` pairs serialized as a JSON object.
mod labeled {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(pairs: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(pairs.iter().map(|(label, value)| (label, value)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct PairsVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of labels")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    pairs.push(entry);
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionSpec {
    pub key: String,
    #[serde(default, with = "labeled", skip_serializing_if = "Vec::is_empty")]
    pub kwargs: Vec<(String, String)>,
    #[serde(default = "default_primary_index_key")]
    pub primary_index_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatenationSpec {
    pub key: String,
    #[serde(default, with = "labeled", skip_serializing_if = "Vec::is_empty")]
    pub kwargs: Vec<(String, String)>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_primary_index_key() -> String {
    DEFAULT_SPAN_INDEX.to_string()
}

fn default_separator() -> String {
    DEFAULT_CONCAT_SEPARATOR.to_string()
}

/// Serialized [`SpanQuery`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, with = "labeled", skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<(String, ProjectionSpec)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<ExplosionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concat: Option<ConcatenationSpec>,
    #[serde(default, with = "labeled", skip_serializing_if = "Vec::is_empty")]
    pub rename: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ProjectionSpec>,
}

// ============================================================================
// SpanQuery
// ============================================================================

/// A composable, immutable span query.
///
/// Every builder method returns a new query and leaves `self` untouched.
/// Expressions are compiled when added, so a malformed expression fails
/// before anything reaches the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanQuery {
    select: Vec<(String, Projector)>,
    filter: SpanFilter,
    explode: Option<Explosion>,
    concat: Option<Concatenation>,
    rename: Vec<(String, String)>,
    index: Projector,
    concat_separator: String,
    valid_eval_names: Option<Vec<String>>,
}

impl Default for SpanQuery {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            filter: SpanFilter::default(),
            explode: None,
            concat: None,
            rename: Vec::new(),
            index: Projector::span_column(DEFAULT_SPAN_INDEX, SpanColumn::SpanId),
            concat_separator: DEFAULT_CONCAT_SEPARATOR.to_string(),
            valid_eval_names: None,
        }
    }
}

impl SpanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add projections labeled by their own expression.
    pub fn select<I, S>(&self, keys: I) -> Result<Self, DslError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = self.clone();
        for key in keys {
            let projector = Projector::new(key.as_ref())?;
            query
                .select
                .push((projector.expression().to_string(), projector));
        }
        Ok(query)
    }

    /// Add projections under explicit labels.
    pub fn select_as(&self, pairs: &[(&str, &str)]) -> Result<Self, DslError> {
        let mut query = self.clone();
        for (label, key) in pairs {
            query
                .select
                .push((label.to_string(), Projector::new(key)?));
        }
        Ok(query)
    }

    /// Replace the filter condition.
    pub fn filter(&self, condition: &str) -> Result<Self, DslError> {
        Ok(Self {
            filter: SpanFilter::new(condition, self.valid_eval_names.as_deref())?,
            ..self.clone()
        })
    }

    /// Restrict evaluation names usable in filters; recompiles the current filter.
    pub fn with_valid_eval_names<I, S>(&self, names: I) -> Result<Self, DslError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Ok(Self {
            filter: SpanFilter::new(self.filter.condition(), Some(names.as_slice()))?,
            valid_eval_names: Some(names),
            ..self.clone()
        })
    }

    /// Produce one row per object element of the array at `key`.
    ///
    /// Each `(label, path)` pair extracts a field from the element; without
    /// pairs every leaf of the element becomes a column.
    pub fn explode(&self, key: &str, kwargs: &[(&str, &str)]) -> Result<Self, DslError> {
        let primary_index = match &self.explode {
            Some(explosion) => explosion.primary_index.clone(),
            None => Projector::span_column(DEFAULT_SPAN_INDEX, SpanColumn::SpanId),
        };
        Ok(Self {
            explode: Some(Explosion::new(key, kwargs, primary_index)?),
            ..self.clone()
        })
    }

    /// Join the array at `key` into one string per span.
    pub fn concat(&self, key: &str, kwargs: &[(&str, &str)]) -> Result<Self, DslError> {
        Ok(Self {
            concat: Some(Concatenation::new(key, kwargs, &self.concat_separator)?),
            ..self.clone()
        })
    }

    /// Separator for the current and any later concat.
    pub fn with_concat_separator(&self, separator: &str) -> Self {
        let mut query = self.clone();
        query.concat_separator = separator.to_string();
        if let Some(concat) = &mut query.concat {
            concat.separator = separator.to_string();
        }
        query
    }

    /// Span-level index of exploded rows, next to the element position.
    pub fn with_explode_primary_index_key(&self, key: &str) -> Result<Self, DslError> {
        let Some(explosion) = &self.explode else {
            return Err(DslError::InvalidArgument(
                "explode must be set before its primary index key".to_string(),
            ));
        };
        let explosion = Explosion {
            primary_index: Projector::new(key)?,
            ..explosion.clone()
        };
        Ok(Self {
            explode: Some(explosion),
            ..self.clone()
        })
    }

    /// Rename result columns; applied after everything else.
    pub fn rename(&self, pairs: &[(&str, &str)]) -> Self {
        let mut query = self.clone();
        query.rename.extend(
            pairs
                .iter()
                .map(|(old, new)| (old.to_string(), new.to_string())),
        );
        query
    }

    /// Index of result rows when nothing is exploded.
    pub fn with_index(&self, key: &str) -> Result<Self, DslError> {
        Ok(Self {
            index: Projector::new(key)?,
            ..self.clone()
        })
    }

    /// Whether the query falls back to all span columns.
    pub fn is_simple(&self) -> bool {
        self.select.is_empty() && self.explode.is_none() && self.concat.is_none()
    }

    pub fn to_spec(&self) -> QuerySpec {
        QuerySpec {
            select: self
                .select
                .iter()
                .map(|(label, projector)| {
                    let key = projector.expression().to_string();
                    (label.clone(), ProjectionSpec { key })
                })
                .collect(),
            filter: (!self.filter.is_empty()).then(|| self.filter.to_spec()),
            explode: self.explode.as_ref().map(|explosion| ExplosionSpec {
                key: explosion.key.clone(),
                kwargs: element_specs(&explosion.kwargs),
                primary_index_key: explosion.primary_index.expression().to_string(),
            }),
            concat: self.concat.as_ref().map(|concat| ConcatenationSpec {
                key: concat.key.clone(),
                kwargs: element_specs(&concat.kwargs),
                separator: concat.separator.clone(),
            }),
            rename: self.rename.clone(),
            index: (self.index.expression() != DEFAULT_SPAN_INDEX).then(|| ProjectionSpec {
                key: self.index.expression().to_string(),
            }),
        }
    }

    pub fn from_spec(spec: &QuerySpec, valid_eval_names: Option<&[String]>) -> Result<Self, DslError> {
        let mut query = Self::new();
        if let Some(names) = valid_eval_names {
            query = query.with_valid_eval_names(names.iter().cloned())?;
        }
        let select: Vec<(&str, &str)> = spec
            .select
            .iter()
            .map(|(label, projection)| (label.as_str(), projection.key.as_str()))
            .collect();
        query = query.select_as(&select)?;
        if let Some(filter) = &spec.filter {
            query = query.filter(&filter.condition)?;
        }
        if let Some(explode) = &spec.explode {
            query = query
                .explode(&explode.key, &borrowed(&explode.kwargs))?
                .with_explode_primary_index_key(&explode.primary_index_key)?;
        }
        if let Some(concat) = &spec.concat {
            query = query
                .with_concat_separator(&concat.separator)
                .concat(&concat.key, &borrowed(&concat.kwargs))?;
        }
        query = query.rename(&borrowed(&spec.rename));
        if let Some(index) = &spec.index {
            query = query.with_index(&index.key)?;
        }
        Ok(query)
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Run the query and collect the result frame.
    pub async fn execute(
        &self,
        db: &DatabaseService,
        params: &QueryParams,
    ) -> Result<SpanFrame, QueryError> {
        let backend = db.backend();
        let dialect = backend.dialect();
        let sfx = random_suffix();
        let columns = self.output_columns();
        let in_process = !dialect.supports_ordered_unnest();

        let statement = self.base_statement(params, &columns, &sfx, in_process);
        let mut sql_params = SqlParams::default();
        let sql = statement.to_sql(dialect, &mut sql_params);
        tracing::debug!(
            backend = %backend,
            columns = columns.len(),
            explode = self.explode.is_some(),
            concat = self.concat.is_some(),
            "Executing span query"
        );
        let rows = db.fetch_text_rows(&sql, &sql_params).await?;

        let mut base_rows = Vec::with_capacity(rows.len());
        for cells in rows {
            base_rows.push(self.decode_base_row(&columns, cells, in_process)?);
        }

        let mut exploded: FxHashMap<i64, Vec<Vec<(String, JsonValue)>>> = FxHashMap::default();
        let mut concatenated: FxHashMap<i64, Vec<(String, JsonValue)>> = FxHashMap::default();
        if in_process {
            for row in &base_rows {
                if let Some(explosion) = &self.explode {
                    let rows = explosion
                        .expand(&row.explode_array)
                        .into_iter()
                        .map(|(position, mut fields)| {
                            fields.insert(
                                0,
                                (explosion.position_label.clone(), JsonValue::from(position)),
                            );
                            fields
                        })
                        .collect();
                    exploded.insert(row.rowid, rows);
                }
                if let Some(fields) = self.concat.as_ref().and_then(|c| c.join(&row.concat_array)) {
                    concatenated.insert(row.rowid, fields);
                }
            }
        } else {
            if let Some(explosion) = &self.explode {
                exploded = self.fetch_exploded(db, explosion, params, &sfx).await?;
            }
            if let Some(concat) = &self.concat {
                concatenated = self.fetch_concatenated(db, concat, params, &sfx).await?;
            }
        }

        let mut frame = SpanFrame::from_records(
            self.index_names(),
            self.merge(base_rows, exploded, concatenated),
        );
        let legacy: Vec<(String, String)> = LEGACY_LABELS
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect();
        frame.rename(&legacy);
        frame.rename(&self.rename);
        tracing::debug!(rows = frame.len(), "Span query complete");
        Ok(frame)
    }

    fn index_names(&self) -> Vec<String> {
        match &self.explode {
            Some(explosion) => vec![
                explosion.primary_index.expression().to_string(),
                explosion.position_label.clone(),
            ],
            None => vec![self.index.expression().to_string()],
        }
    }

    /// Columns of the base statement, index first.
    fn output_columns(&self) -> Vec<OutputColumn> {
        if self.is_simple() {
            let mut columns = vec![OutputColumn::new(self.index.expression(), &self.index)];
            columns.extend(DEFAULT_COLUMNS.iter().map(|(label, column)| {
                let projector = Projector::span_column(label, *column);
                OutputColumn {
                    flatten: *column == SpanColumn::Attributes,
                    ..OutputColumn::new(label, &projector)
                }
            }));
            return columns;
        }

        let index = match &self.explode {
            Some(explosion) => &explosion.primary_index,
            None => &self.index,
        };
        let mut columns = vec![OutputColumn::new(index.expression(), index)];
        columns.extend(
            self.select
                .iter()
                .map(|(label, projector)| OutputColumn::new(label, projector)),
        );
        columns
    }

    /// Spans of the project and time range that pass the filter, in start order.
    fn span_selection(&self, params: &QueryParams) -> SelectStatement {
        let mut statement = SelectStatement::from("spans")
            .join(Join {
                kind: JoinKind::Inner,
                table: "traces".to_string(),
                on: SqlExpr::eq(
                    SqlExpr::column("traces.id"),
                    SqlExpr::column("spans.trace_rowid"),
                ),
            })
            .join(Join {
                kind: JoinKind::Inner,
                table: "projects".to_string(),
                on: SqlExpr::eq(
                    SqlExpr::column("projects.id"),
                    SqlExpr::column("traces.project_rowid"),
                ),
            })
            .filter(SqlExpr::eq(
                SqlExpr::column("projects.name"),
                SqlExpr::text(params.project_name.clone()),
            ));
        if let Some(start) = params.start_time {
            statement = statement.filter(SqlExpr::compare(
                SqlExpr::column("spans.start_time"),
                CompareOp::GtE,
                SqlExpr::Value(SqlValue::Int(start.timestamp_micros())),
            ));
        }
        if let Some(end) = params.end_time {
            statement = statement.filter(SqlExpr::compare(
                SqlExpr::column("spans.start_time"),
                CompareOp::Lt,
                SqlExpr::Value(SqlValue::Int(end.timestamp_micros())),
            ));
        }
        if params.root_spans_only {
            statement = statement.filter(SqlExpr::Or(vec![
                SqlExpr::IsNull {
                    expr: Box::new(SqlExpr::column("spans.parent_id")),
                    negated: false,
                },
                SqlExpr::Exists {
                    subquery: Box::new(SelectStatement::from("spans AS parent").filter(
                        SqlExpr::eq(
                            SqlExpr::column("parent.span_id"),
                            SqlExpr::column("spans.parent_id"),
                        ),
                    )),
                    negated: true,
                },
            ]));
        }
        self.filter
            .apply(statement)
            .order_by("spans.start_time")
            .order_by("spans.id")
            .limit(params.limit)
    }

    /// Projected columns plus the span row id; with `with_arrays`, the raw
    /// explode and concat arrays as well.
    fn base_statement(
        &self,
        params: &QueryParams,
        columns: &[OutputColumn],
        sfx: &str,
        with_arrays: bool,
    ) -> SelectStatement {
        let mut statement = self.span_selection(params);
        for column in columns {
            statement = statement.column(column.expr.clone(), format!("{}{sfx}", column.label));
        }
        statement = statement.column(
            SqlExpr::JsonOutput(Box::new(SqlExpr::column("spans.id"))),
            format!("__rowid{sfx}"),
        );
        if with_arrays {
            if let Some(explosion) = &self.explode {
                statement = statement.column(
                    SqlExpr::DocumentOutput(Box::new(explosion.array.clone())),
                    format!("__explode{sfx}"),
                );
            }
            if let Some(concat) = &self.concat {
                statement = statement.column(
                    SqlExpr::DocumentOutput(Box::new(concat.array.clone())),
                    format!("__concat{sfx}"),
                );
            }
        }
        statement
    }

    /// Selected span ids, start times and one array, as a CTE.
    fn array_cte(&self, params: &QueryParams, array: &SqlExpr) -> SelectStatement {
        self.span_selection(params)
            .column(SqlExpr::column("spans.id"), BASE_ROWID)
            .column(SqlExpr::column("spans.start_time"), BASE_START)
            .column(array.clone(), BASE_ARRAY)
    }

    fn explode_statement(
        &self,
        explosion: &Explosion,
        params: &QueryParams,
        backend: Backend,
        sfx: &str,
    ) -> SelectStatement {
        let unnest = backend
            .dialect()
            .build_array_unnest(&format!("{BASE_CTE}.{BASE_ARRAY}"), ELEMENT_ALIAS);
        let mut statement = SelectStatement::from(BASE_CTE)
            .with_cte(BASE_CTE, self.array_cte(params, &explosion.array))
            .column(
                SqlExpr::JsonOutput(Box::new(SqlExpr::column(format!("{BASE_CTE}.{BASE_ROWID}")))),
                format!("__rowid{sfx}"),
            )
            .column(
                SqlExpr::JsonOutput(Box::new(SqlExpr::column(unnest.position.clone()))),
                format!("{}{sfx}", explosion.position_label),
            );
        if explosion.kwargs.is_empty() {
            statement = statement.column(
                SqlExpr::DocumentOutput(Box::new(SqlExpr::column(unnest.element.clone()))),
                format!("__element{sfx}"),
            );
        }
        for (label, path) in &explosion.kwargs {
            statement = statement.column(
                SqlExpr::DocumentOutput(Box::new(SqlExpr::Json {
                    column: unnest.element.clone(),
                    path: path.keys.clone(),
                    cast: JsonCast::Json,
                })),
                format!("{label}{sfx}"),
            );
        }
        statement
            .raw_join(unnest.join)
            .filter(SqlExpr::IsJsonObject(Box::new(SqlExpr::column(
                unnest.element,
            ))))
            .order_by(format!("{BASE_CTE}.{BASE_START}"))
            .order_by(format!("{BASE_CTE}.{BASE_ROWID}"))
            .order_by(unnest.position)
    }

    fn concat_statement(
        &self,
        concat: &Concatenation,
        params: &QueryParams,
        backend: Backend,
        sfx: &str,
    ) -> SelectStatement {
        let unnest = backend
            .dialect()
            .build_array_unnest(&format!("{BASE_CTE}.{BASE_ARRAY}"), ELEMENT_ALIAS);
        let aggregate = |value: SqlExpr| {
            SqlExpr::JsonOutput(Box::new(SqlExpr::OrderedConcat {
                value: Box::new(SqlExpr::ElementText(Box::new(value))),
                separator: Box::new(SqlExpr::text(concat.separator.clone())),
                order: unnest.position.clone(),
            }))
        };
        let mut statement = SelectStatement::from(BASE_CTE)
            .with_cte(BASE_CTE, self.array_cte(params, &concat.array))
            .column(
                SqlExpr::JsonOutput(Box::new(SqlExpr::column(format!("{BASE_CTE}.{BASE_ROWID}")))),
                format!("__rowid{sfx}"),
            );
        if concat.kwargs.is_empty() {
            statement = statement.column(
                aggregate(SqlExpr::column(unnest.element.clone())),
                format!("{}{sfx}", concat.key),
            );
        }
        for (label, path) in &concat.kwargs {
            let value = SqlExpr::Json {
                column: unnest.element.clone(),
                path: path.keys.clone(),
                cast: JsonCast::Json,
            };
            statement = statement.column(aggregate(value), format!("{label}{sfx}"));
        }
        statement
            .raw_join(unnest.join.clone())
            .group_by(format!("{BASE_CTE}.{BASE_ROWID}"))
    }

    async fn fetch_exploded(
        &self,
        db: &DatabaseService,
        explosion: &Explosion,
        params: &QueryParams,
        sfx: &str,
    ) -> Result<FxHashMap<i64, Vec<Vec<(String, JsonValue)>>>, QueryError> {
        let backend = db.backend();
        let statement = self.explode_statement(explosion, params, backend, sfx);
        let mut sql_params = SqlParams::default();
        let sql = statement.to_sql(backend.dialect(), &mut sql_params);
        let options = FlattenOptions::default();

        let mut exploded: FxHashMap<i64, Vec<Vec<(String, JsonValue)>>> = FxHashMap::default();
        for cells in db.fetch_text_rows(&sql, &sql_params).await? {
            let mut cells = cells.into_iter();
            let rowid = decode_rowid(cells.next().flatten())?;
            let position = decode(&explosion.position_label, cells.next().flatten())?;
            let mut fields = vec![(explosion.position_label.clone(), position)];
            if explosion.kwargs.is_empty() {
                let element = decode(&explosion.key, cells.next().flatten())?;
                fields.extend(flatten(&element, &options));
            } else {
                for ((label, _), cell) in explosion.kwargs.iter().zip(cells) {
                    fields.push((label.clone(), decode(label, cell)?));
                }
            }
            exploded.entry(rowid).or_default().push(fields);
        }
        Ok(exploded)
    }

    async fn fetch_concatenated(
        &self,
        db: &DatabaseService,
        concat: &Concatenation,
        params: &QueryParams,
        sfx: &str,
    ) -> Result<FxHashMap<i64, Vec<(String, JsonValue)>>, QueryError> {
        let backend = db.backend();
        let statement = self.concat_statement(concat, params, backend, sfx);
        let mut sql_params = SqlParams::default();
        let sql = statement.to_sql(backend.dialect(), &mut sql_params);

        let labels = concat.labels();
        let mut concatenated = FxHashMap::default();
        for cells in db.fetch_text_rows(&sql, &sql_params).await? {
            let mut cells = cells.into_iter();
            let rowid = decode_rowid(cells.next().flatten())?;
            let fields = labels
                .iter()
                .zip(cells)
                .map(|(label, cell)| Ok((label.clone(), decode(label, cell)?)))
                .collect::<Result<Vec<_>, QueryError>>()?;
            concatenated.insert(rowid, fields);
        }
        Ok(concatenated)
    }

    fn decode_base_row(
        &self,
        columns: &[OutputColumn],
        cells: Vec<Option<String>>,
        with_arrays: bool,
    ) -> Result<BaseRow, QueryError> {
        let mut cells = cells.into_iter();
        let mut fields = Vec::with_capacity(columns.len());
        for column in columns {
            let value = decode(&column.label, cells.next().flatten())?;
            if column.flatten {
                let options = FlattenOptions::default();
                fields.extend(
                    flatten(&value, &options)
                        .map(|(path, leaf)| (format!("{}.{path}", column.label), leaf)),
                );
                continue;
            }
            let value = match (column.ty, value.as_i64()) {
                (ExprType::Timestamp, Some(micros)) => JsonValue::String(micros_to_rfc3339(micros)),
                _ => value,
            };
            fields.push((column.label.clone(), value));
        }
        let rowid = decode_rowid(cells.next().flatten())?;

        let mut row = BaseRow {
            rowid,
            fields,
            explode_array: JsonValue::Null,
            concat_array: JsonValue::Null,
        };
        if with_arrays {
            if let Some(explosion) = &self.explode {
                row.explode_array = decode(&explosion.key, cells.next().flatten())?;
            }
            if let Some(concat) = &self.concat {
                row.concat_array = decode(&concat.key, cells.next().flatten())?;
            }
        }
        Ok(row)
    }

    /// Combine span rows with their exploded and concatenated fields.
    ///
    /// Exploded rows take the span's concatenated fields; a concatenated
    /// label shadows an exploded one. Spans with neither are dropped when
    /// either operation is present.
    fn merge(
        &self,
        base_rows: Vec<BaseRow>,
        mut exploded: FxHashMap<i64, Vec<Vec<(String, JsonValue)>>>,
        mut concatenated: FxHashMap<i64, Vec<(String, JsonValue)>>,
    ) -> Vec<Vec<(String, JsonValue)>> {
        let mut records = Vec::new();
        for row in base_rows {
            let joined = concatenated.remove(&row.rowid);
            match (&self.explode, &self.concat) {
                (Some(explosion), _) => {
                    let rows = exploded.remove(&row.rowid).unwrap_or_default();
                    if rows.is_empty() {
                        if let Some(joined) = joined {
                            let mut record = row.fields;
                            record.push((explosion.position_label.clone(), JsonValue::Null));
                            record.extend(joined);
                            records.push(record);
                        }
                        continue;
                    }
                    for fields in rows {
                        let mut record = row.fields.clone();
                        record.extend(fields);
                        record.extend(joined.iter().flatten().cloned());
                        records.push(record);
                    }
                }
                (None, Some(_)) => {
                    if let Some(joined) = joined {
                        let mut record = row.fields;
                        record.extend(joined);
                        records.push(record);
                    }
                }
                (None, None) => records.push(row.fields),
            }
        }
        records
    }
}

fn element_specs(kwargs: &[(String, ElementPath)]) -> Vec<(String, String)> {
    kwargs
        .iter()
        .map(|(label, path)| (label.clone(), path.source.clone()))
        .collect()
}

fn borrowed(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect()
}

/// Suffix keeping generated column aliases apart from user labels.
fn random_suffix() -> String {
    format!("_{:08x}", rand::thread_rng().r#gen::<u32>())
}

/// One column of the base statement.
#[derive(Debug, Clone)]
struct OutputColumn {
    label: String,
    expr: SqlExpr,
    ty: ExprType,
    /// Expand the JSON document into `label.path` columns
    flatten: bool,
}

impl OutputColumn {
    fn new(label: &str, projector: &Projector) -> Self {
        Self {
            label: label.to_string(),
            expr: projector.output(),
            ty: projector.expr_type(),
            flatten: false,
        }
    }
}

#[derive(Debug)]
struct BaseRow {
    rowid: i64,
    fields: Vec<(String, JsonValue)>,
    explode_array: JsonValue,
    concat_array: JsonValue,
}

fn decode(column: &str, cell: Option<String>) -> Result<JsonValue, QueryError> {
    match cell {
        None => Ok(JsonValue::Null),
        Some(text) => serde_json::from_str(&text).map_err(|e| QueryError::Decode {
            column: column.to_string(),
            message: e.to_string(),
        }),
    }
}

fn decode_rowid(cell: Option<String>) -> Result<i64, QueryError> {
    decode("rowid", cell)?.as_i64().ok_or_else(|| QueryError::Decode {
        column: "rowid".to_string(),
        message: "expected an integer row id".to_string(),
    })
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
