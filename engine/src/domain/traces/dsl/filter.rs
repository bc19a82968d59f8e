//! Compiled span filter conditions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ast::{Expr, ExprKind};
use super::error::DslError;
use super::parser::parse;
use super::translate::{EvalColumn, EvalColumns, Translator};
use super::validate::{Mode, Validator};
use crate::data::sql::{
    Join, JoinKind, SelectStatement, SqlDialect, SqlExpr, SqlParams, SqlValue,
};

/// Table holding evaluation results, one row per span and name.
pub const ANNOTATIONS_TABLE: &str = "span_annotations";

/// One aliased join against [`ANNOTATIONS_TABLE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationJoin {
    pub alias: String,
    pub name: String,
}

/// Serialized form of a [`SpanFilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub condition: String,
}

/// A boolean span predicate compiled from a filter expression.
///
/// Each distinct evaluation name is joined once, whatever the number of
/// references. An empty condition compiles to a filter that matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanFilter {
    condition: String,
    joins: Vec<AnnotationJoin>,
    predicate: Option<SqlExpr>,
}

impl SpanFilter {
    pub fn new(condition: &str, valid_eval_names: Option<&[String]>) -> Result<Self, DslError> {
        if condition.trim().is_empty() {
            return Ok(Self {
                condition: String::new(),
                joins: Vec::new(),
                predicate: None,
            });
        }

        let root = parse(condition)?;
        Validator::new(condition, Mode::Filter, valid_eval_names).validate(&root)?;

        let aliased = alias_evals(condition, &root);
        let translated = if aliased.source == condition {
            Translator::new(condition).predicate(&root)?
        } else {
            let root = parse(&aliased.source)?;
            Translator::new(&aliased.source)
                .with_eval_columns(&aliased.columns)
                .predicate(&root)?
        };

        tracing::debug!(
            condition,
            joins = aliased.joins.len(),
            "Compiled span filter"
        );
        Ok(Self {
            condition: condition.to_string(),
            joins: aliased.joins,
            predicate: Some(translated),
        })
    }

    pub fn from_spec(spec: &FilterSpec, valid_eval_names: Option<&[String]>) -> Result<Self, DslError> {
        Self::new(&spec.condition, valid_eval_names)
    }

    pub fn to_spec(&self) -> FilterSpec {
        FilterSpec {
            condition: self.condition.clone(),
        }
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    pub fn joins(&self) -> &[AnnotationJoin] {
        &self.joins
    }

    /// Add the annotation joins and the predicate to `statement`.
    pub fn apply(&self, mut statement: SelectStatement) -> SelectStatement {
        let Some(predicate) = &self.predicate else {
            return statement;
        };
        for join in &self.joins {
            let table = format!("{ANNOTATIONS_TABLE} AS {}", join.alias);
            if statement.has_join(&table) {
                continue;
            }
            statement = statement.join(Join {
                kind: JoinKind::LeftOuter,
                table,
                on: SqlExpr::And(vec![
                    SqlExpr::eq(
                        SqlExpr::column(format!("{}.span_rowid", join.alias)),
                        SqlExpr::column("spans.id"),
                    ),
                    SqlExpr::eq(
                        SqlExpr::column(format!("{}.name", join.alias)),
                        SqlExpr::Value(SqlValue::Text(join.name.clone())),
                    ),
                ]),
            });
        }
        statement.filter(predicate.clone())
    }

    /// Render a statement selecting the ids of matching spans.
    pub fn render(&self, dialect: &dyn SqlDialect) -> (String, SqlParams) {
        let statement = self.apply(
            SelectStatement::from("spans")
                .column(SqlExpr::column("spans.id"), "id")
                .join(Join {
                    kind: JoinKind::Inner,
                    table: "traces".to_string(),
                    on: SqlExpr::eq(
                        SqlExpr::column("traces.id"),
                        SqlExpr::column("spans.trace_rowid"),
                    ),
                }),
        );
        let mut params = SqlParams::default();
        let sql = statement.to_sql(dialect, &mut params);
        (sql, params)
    }
}

struct AliasedSource {
    source: String,
    joins: Vec<AnnotationJoin>,
    columns: EvalColumns,
}

/// Replace every `evals["name"].attribute` with a generated identifier.
///
/// Table aliases are numbered by first appearance of each name; repeated
/// `(name, attribute)` pairs reuse the same column identifier.
fn alias_evals(source: &str, root: &Expr) -> AliasedSource {
    let mut references = Vec::new();
    collect_eval_references(root, &mut references);
    references.sort_by_key(|(expr, _, _)| expr.span.start);

    let mut joins: Vec<AnnotationJoin> = Vec::new();
    let mut columns = EvalColumns::default();
    let mut identifiers: Vec<((String, String), String)> = Vec::new();
    let mut replacements = Vec::with_capacity(references.len());
    let mut rng = rand::thread_rng();

    for (expr, name, attribute) in references {
        let table = match joins.iter().position(|join| join.name == name) {
            Some(i) => joins[i].alias.clone(),
            None => {
                let alias = format!("span_annotation_{}", joins.len());
                joins.push(AnnotationJoin {
                    alias: alias.clone(),
                    name: name.to_string(),
                });
                alias
            }
        };
        let key = (name.to_string(), attribute.to_string());
        let identifier = match identifiers.iter().find(|(k, _)| *k == key) {
            Some((_, identifier)) => identifier.clone(),
            None => {
                let identifier = format!(
                    "{table}_{attribute}_{:06}",
                    rng.gen_range(0..1_000_000)
                );
                columns.insert(
                    identifier.clone(),
                    EvalColumn {
                        table: table.clone(),
                        attribute: attribute.to_string(),
                    },
                );
                identifiers.push((key, identifier.clone()));
                identifier
            }
        };
        replacements.push((expr.span, identifier));
    }

    let mut aliased = source.to_string();
    for (span, identifier) in replacements.into_iter().rev() {
        aliased.replace_range(span.start..span.end, &identifier);
    }
    AliasedSource {
        source: aliased,
        joins,
        columns,
    }
}

fn collect_eval_references<'a>(expr: &'a Expr, out: &mut Vec<(&'a Expr, &'a str, &'a str)>) {
    if let Some((name, attribute)) = expr.eval_attribute() {
        out.push((expr, name, attribute));
        return;
    }
    match &expr.kind {
        ExprKind::BoolOp { values, .. } => {
            values.iter().for_each(|v| collect_eval_references(v, out))
        }
        ExprKind::BinOp { left, right, .. } => {
            collect_eval_references(left, out);
            collect_eval_references(right, out);
        }
        ExprKind::UnaryOp { operand, .. } => collect_eval_references(operand, out),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            collect_eval_references(left, out);
            comparators
                .iter()
                .for_each(|c| collect_eval_references(c, out));
        }
        ExprKind::Call { args, .. } => args.iter().for_each(|a| collect_eval_references(a, out)),
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            items.iter().for_each(|i| collect_eval_references(i, out))
        }
        ExprKind::Attribute { .. }
        | ExprKind::Subscript { .. }
        | ExprKind::Name(_)
        | ExprKind::Constant(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sql::{PostgresDialect, SqliteDialect};

    #[test]
    fn test_empty_condition_is_noop() {
        let filter = SpanFilter::new("   ", None).unwrap();
        assert!(filter.is_empty());
        let statement = SelectStatement::from("spans").column(SqlExpr::column("spans.id"), "id");
        assert_eq!(filter.apply(statement.clone()), statement);
    }

    #[test]
    fn test_filter_without_evals() {
        let filter = SpanFilter::new("span_kind == 'LLM'", None).unwrap();
        assert!(filter.joins().is_empty());
        let (sql, params) = filter.render(&SqliteDialect);
        assert_eq!(
            sql,
            "SELECT spans.id AS \"id\" FROM spans JOIN traces ON (traces.id = spans.trace_rowid) \
             WHERE (spans.span_kind = ?)"
        );
        assert_eq!(params.values, vec![SqlValue::Text("LLM".into())]);
    }

    #[test]
    fn test_each_eval_name_is_joined_once() {
        let filter = SpanFilter::new(
            "evals['QA'].label == 'correct' and evals['QA'].score > 0.5 \
             or annotations['Toxicity'].label != 'toxic' and evals['QA'].score < 0.9",
            None,
        )
        .unwrap();
        assert_eq!(
            filter.joins(),
            &[
                AnnotationJoin {
                    alias: "span_annotation_0".into(),
                    name: "QA".into()
                },
                AnnotationJoin {
                    alias: "span_annotation_1".into(),
                    name: "Toxicity".into()
                },
            ]
        );

        let (sql, params) = filter.render(&SqliteDialect);
        assert_eq!(sql.matches("LEFT OUTER JOIN span_annotations").count(), 2);
        assert!(sql.contains(
            "LEFT OUTER JOIN span_annotations AS span_annotation_0 ON \
             ((span_annotation_0.span_rowid = spans.id) AND (span_annotation_0.name = ?))"
        ));
        assert!(sql.contains("(span_annotation_0.score > ?)"));
        assert!(sql.contains("(span_annotation_1.label != ?)"));
        assert_eq!(params.values[0], SqlValue::Text("QA".into()));
        assert_eq!(params.values[1], SqlValue::Text("Toxicity".into()));
    }

    #[test]
    fn test_filter_keeps_original_condition() {
        let condition = "evals[\"QA\"].score > 0.5";
        let filter = SpanFilter::new(condition, None).unwrap();
        assert_eq!(filter.condition(), condition);
        assert_eq!(filter.to_spec().condition, condition);
        let restored = SpanFilter::from_spec(&filter.to_spec(), None).unwrap();
        assert_eq!(restored.joins(), filter.joins());
    }

    #[test]
    fn test_invalid_eval_name_fails_at_construction() {
        let names = vec!["Hallucination".to_string()];
        let err = SpanFilter::new("evals[\"Hallucinaton\"].score > 0.5", Some(&names)).unwrap_err();
        assert!(err.to_string().contains("did you mean \"Hallucination\""));
    }

    #[test]
    fn test_render_postgres() {
        let filter = SpanFilter::new("evals['QA'].score > 0.5", None).unwrap();
        let (sql, _) = filter.render(&PostgresDialect);
        assert!(sql.contains("(span_annotation_0.name = $1::TEXT)"), "{sql}");
        assert!(sql.ends_with("WHERE (span_annotation_0.score > $2::DOUBLE PRECISION)"), "{sql}");
    }
}
