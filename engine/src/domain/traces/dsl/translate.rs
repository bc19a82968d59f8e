//! Typed translation of validated expressions into SQL expressions.
//!
//! Attribute paths are untyped until they meet something typed: a path
//! compared with a string literal is read as text, against a number as a
//! float, and so on. Everything else keeps the type of its column.

use rustc_hash::FxHashMap;

use super::ast::{BinOperator, BoolOperator, CmpOperator, Constant, Expr, ExprKind, UnaryOperator};
use super::columns::{ATTRIBUTES_COLUMN, ExprType, SpanColumn, eval_attribute_type};
use super::error::DslError;
use crate::data::sql::{ArithmeticOp, CastType, CompareOp, JsonCast, PathKey, SqlExpr, SqlValue};
use crate::utils::time::parse_timestamp;

/// An SQL expression together with its inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct Typed {
    pub expr: SqlExpr,
    pub ty: ExprType,
}

impl Typed {
    fn new(expr: SqlExpr, ty: ExprType) -> Self {
        Self { expr, ty }
    }

    /// Cast to `to`, retyping JSON lookups in place.
    pub fn cast(self, to: CastType) -> SqlExpr {
        let already = matches!(
            (self.ty, to),
            (ExprType::Str, CastType::Text)
                | (ExprType::Float, CastType::Float)
                | (ExprType::Int, CastType::Integer)
                | (ExprType::Bool, CastType::Boolean)
                | (ExprType::Null, _)
        );
        match self.expr {
            SqlExpr::Json { column, path, .. } => SqlExpr::Json {
                column,
                path,
                cast: json_cast(to),
            },
            expr if already => expr,
            expr => expr.cast(to),
        }
    }

    fn typed_cast(self, to: CastType) -> Typed {
        let ty = match to {
            CastType::Text => ExprType::Str,
            CastType::Float => ExprType::Float,
            CastType::Integer => ExprType::Int,
            CastType::Boolean => ExprType::Bool,
        };
        Typed::new(self.cast(to), ty)
    }

    /// Expression producing the value as JSON text.
    pub fn output(self) -> SqlExpr {
        match (self.expr, self.ty) {
            (SqlExpr::Json { column, path, .. }, _) => {
                SqlExpr::DocumentOutput(Box::new(SqlExpr::Json {
                    column,
                    path,
                    cast: JsonCast::Json,
                }))
            }
            (expr, ExprType::Document) => SqlExpr::DocumentOutput(Box::new(expr)),
            (expr, _) => SqlExpr::JsonOutput(Box::new(expr)),
        }
    }
}

fn json_cast(to: CastType) -> JsonCast {
    match to {
        CastType::Text => JsonCast::Text,
        CastType::Float => JsonCast::Float,
        CastType::Integer => JsonCast::Integer,
        CastType::Boolean => JsonCast::Boolean,
    }
}

/// Cast applied to an untyped operand meeting a value of type `ty`.
fn cast_for(ty: ExprType) -> Option<CastType> {
    match ty {
        ExprType::Str => Some(CastType::Text),
        ExprType::Int | ExprType::Float | ExprType::Timestamp => Some(CastType::Float),
        ExprType::Bool => Some(CastType::Boolean),
        ExprType::Json | ExprType::Document | ExprType::Null => None,
    }
}

/// Annotation column standing in for `evals["name"].attribute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalColumn {
    pub table: String,
    pub attribute: String,
}

pub type EvalColumns = FxHashMap<String, EvalColumn>;

pub struct Translator<'a> {
    source: &'a str,
    eval_columns: Option<&'a EvalColumns>,
}

impl<'a> Translator<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            eval_columns: None,
        }
    }

    pub fn with_eval_columns(mut self, columns: &'a EvalColumns) -> Self {
        self.eval_columns = Some(columns);
        self
    }

    fn error(&self, message: impl Into<String>, expr: &Expr) -> DslError {
        DslError::syntax(message, expr.source(self.source))
    }

    /// Translate a filter predicate.
    pub fn predicate(&self, expr: &Expr) -> Result<SqlExpr, DslError> {
        self.boolean(expr)
    }

    pub fn translate(&self, expr: &Expr) -> Result<Typed, DslError> {
        match &expr.kind {
            ExprKind::BoolOp { op, values } => {
                let items = values
                    .iter()
                    .map(|value| self.boolean(value))
                    .collect::<Result<Vec<_>, _>>()?;
                let combined = match op {
                    BoolOperator::And => SqlExpr::And(items),
                    BoolOperator::Or => SqlExpr::Or(items),
                };
                Ok(Typed::new(combined, ExprType::Bool))
            }
            ExprKind::UnaryOp { op, operand } => self.unary(expr, *op, operand),
            ExprKind::BinOp { left, op, right } => self.arithmetic(expr, left, *op, right),
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut pairs = Vec::with_capacity(ops.len());
                let mut previous = left.as_ref();
                for (op, comparator) in ops.iter().zip(comparators) {
                    pairs.push(self.compare(expr, previous, *op, comparator)?);
                    previous = comparator;
                }
                let combined = if pairs.len() == 1 {
                    pairs.remove(0)
                } else {
                    SqlExpr::And(pairs)
                };
                Ok(Typed::new(combined, ExprType::Bool))
            }
            ExprKind::Call { func, args, .. } => {
                let to = match (&func.kind, args.as_slice()) {
                    (ExprKind::Name(name), [_]) if name == "str" => CastType::Text,
                    (ExprKind::Name(name), [_]) if name == "float" => CastType::Float,
                    (ExprKind::Name(name), [_]) if name == "int" => CastType::Integer,
                    _ => return Err(self.error("unsupported call", expr)),
                };
                Ok(self.translate(&args[0])?.typed_cast(to))
            }
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {
                self.path(expr)
            }
            ExprKind::Constant(constant) => Ok(constant_value(constant)),
            ExprKind::List(_) | ExprKind::Tuple(_) => Err(self.error(
                "lists and tuples are only supported on the right side of `in`",
                expr,
            )),
        }
    }

    /// Translate in boolean context.
    fn boolean(&self, expr: &Expr) -> Result<SqlExpr, DslError> {
        let typed = self.translate(expr)?;
        Ok(typed.cast(CastType::Boolean))
    }

    fn unary(&self, expr: &Expr, op: UnaryOperator, operand: &Expr) -> Result<Typed, DslError> {
        if op == UnaryOperator::Not {
            let inner = self.boolean(operand)?;
            return Ok(Typed::new(SqlExpr::Not(Box::new(inner)), ExprType::Bool));
        }
        let value = self.translate(operand)?;
        let value = if matches!(value.ty, ExprType::Int | ExprType::Float) {
            value
        } else {
            value.typed_cast(CastType::Float)
        };
        match op {
            UnaryOperator::USub => Ok(Typed::new(
                SqlExpr::Negate(Box::new(value.expr)),
                value.ty,
            )),
            UnaryOperator::UAdd => Ok(value),
            _ => Err(self.error("unsupported unary operator", expr)),
        }
    }

    fn arithmetic(
        &self,
        expr: &Expr,
        left: &Expr,
        op: BinOperator,
        right: &Expr,
    ) -> Result<Typed, DslError> {
        let op = match op {
            BinOperator::Add => ArithmeticOp::Add,
            BinOperator::Sub => ArithmeticOp::Sub,
            BinOperator::Mult => ArithmeticOp::Mul,
            BinOperator::Div => ArithmeticOp::Div,
            other => return Err(self.error(format!("operator `{other}` is not supported"), expr)),
        };
        let left = self.translate(left)?;
        let right = self.translate(right)?;

        let numeric = op != ArithmeticOp::Add || left.ty.is_numeric() || right.ty.is_numeric();
        if numeric {
            return Ok(Typed::new(
                SqlExpr::Arithmetic {
                    left: Box::new(left.cast(CastType::Float)),
                    op,
                    right: Box::new(right.cast(CastType::Float)),
                },
                ExprType::Float,
            ));
        }
        Ok(Typed::new(
            SqlExpr::Concat {
                left: Box::new(left.cast(CastType::Text)),
                right: Box::new(right.cast(CastType::Text)),
            },
            ExprType::Str,
        ))
    }

    fn compare(
        &self,
        expr: &Expr,
        left: &Expr,
        op: CmpOperator,
        right: &Expr,
    ) -> Result<SqlExpr, DslError> {
        let op = match op {
            CmpOperator::In | CmpOperator::NotIn => {
                return self.membership(left, op == CmpOperator::NotIn, right);
            }
            CmpOperator::Eq | CmpOperator::Is => CompareOp::Eq,
            CmpOperator::NotEq | CmpOperator::IsNot => CompareOp::NotEq,
            CmpOperator::Lt => CompareOp::Lt,
            CmpOperator::LtE => CompareOp::LtE,
            CmpOperator::Gt => CompareOp::Gt,
            CmpOperator::GtE => CompareOp::GtE,
        };

        let is_none = |e: &Expr| matches!(e.kind, ExprKind::Constant(Constant::None));
        if matches!(op, CompareOp::Eq | CompareOp::NotEq) {
            let other = if is_none(right) {
                Some(left)
            } else if is_none(left) {
                Some(right)
            } else {
                None
            };
            if let Some(other) = other {
                return Ok(SqlExpr::IsNull {
                    expr: Box::new(self.translate(other)?.expr),
                    negated: op == CompareOp::NotEq,
                });
            }
        }

        let left = self.translate(left)?;
        let right = self.translate(right)?;
        let (left, right) = self.coerce(expr, left, right)?;
        Ok(SqlExpr::compare(left, op, right))
    }

    /// Bring both sides of a comparison to a common SQL type.
    fn coerce(&self, expr: &Expr, left: Typed, right: Typed) -> Result<(SqlExpr, SqlExpr), DslError> {
        let left = self.timestamp_literal(expr, left, right.ty)?;
        let right = self.timestamp_literal(expr, right, left.ty)?;
        let left_cast = left.ty.is_untyped().then(|| cast_for(right.ty)).flatten();
        let right_cast = right.ty.is_untyped().then(|| cast_for(left.ty)).flatten();
        let left = match left_cast {
            Some(to) => left.cast(to),
            None => left.expr,
        };
        let right = match right_cast {
            Some(to) => right.cast(to),
            None => right.expr,
        };
        Ok((left, right))
    }

    /// String literal compared with a timestamp column becomes microseconds.
    fn timestamp_literal(&self, expr: &Expr, value: Typed, other: ExprType) -> Result<Typed, DslError> {
        if other != ExprType::Timestamp {
            return Ok(value);
        }
        match &value.expr {
            SqlExpr::Value(SqlValue::Text(text)) => {
                let Some(parsed) = parse_timestamp(text) else {
                    return Err(self.error(format!("invalid timestamp {text:?}"), expr));
                };
                Ok(Typed::new(
                    SqlExpr::Value(SqlValue::Int(parsed.timestamp_micros())),
                    ExprType::Timestamp,
                ))
            }
            _ => Ok(value),
        }
    }

    fn membership(&self, left: &Expr, negated: bool, right: &Expr) -> Result<SqlExpr, DslError> {
        let needle = self.translate(left)?;
        let (ExprKind::List(items) | ExprKind::Tuple(items)) = &right.kind else {
            // Anything but a literal collection is a substring test
            let haystack = self.translate(right)?;
            return Ok(SqlExpr::TextContains {
                haystack: Box::new(haystack.cast(CastType::Text)),
                needle: Box::new(needle.cast(CastType::Text)),
                negated,
            });
        };

        let items = items
            .iter()
            .map(|item| self.translate(item))
            .collect::<Result<Vec<_>, _>>()?;
        let all_text = items.iter().all(|item| item.ty == ExprType::Str);
        let all_numeric = items
            .iter()
            .all(|item| matches!(item.ty, ExprType::Int | ExprType::Float));

        let (expr, items) = if all_text || all_numeric {
            let target = if all_text { CastType::Text } else { CastType::Float };
            let expr = if needle.ty.is_untyped() {
                needle.cast(target)
            } else {
                needle.expr
            };
            (expr, items.into_iter().map(|item| item.expr).collect())
        } else {
            (
                needle.cast(CastType::Text),
                items
                    .into_iter()
                    .map(|item| item.cast(CastType::Text))
                    .collect(),
            )
        };
        Ok(SqlExpr::InList {
            expr: Box::new(expr),
            items,
            negated,
        })
    }

    /// Names, attribute chains and subscripts.
    fn path(&self, expr: &Expr) -> Result<Typed, DslError> {
        if let ExprKind::Name(name) = &expr.kind
            && let Some(column) = self.eval_columns.and_then(|columns| columns.get(name))
        {
            return Ok(Typed::new(
                SqlExpr::column(format!("{}.{}", column.table, column.attribute)),
                eval_attribute_type(&column.attribute),
            ));
        }
        if let Some(column) = expr.dotted_name().and_then(|name| SpanColumn::resolve(&name)) {
            return Ok(Typed::new(column_expr(column), column.expr_type()));
        }

        let mut path = Vec::new();
        self.segments(expr, &mut path)?;
        if path.first() == Some(&PathKey::key(SpanColumn::Attributes.name())) {
            path.remove(0);
        }
        if path.is_empty() {
            return Ok(Typed::new(
                SqlExpr::column(ATTRIBUTES_COLUMN),
                ExprType::Document,
            ));
        }
        Ok(Typed::new(
            SqlExpr::Json {
                column: ATTRIBUTES_COLUMN.to_string(),
                path,
                cast: JsonCast::Value,
            },
            ExprType::Json,
        ))
    }

    fn segments(&self, expr: &Expr, path: &mut Vec<PathKey>) -> Result<(), DslError> {
        match &expr.kind {
            ExprKind::Name(name) => path.push(PathKey::key(name)),
            ExprKind::Attribute { value, attr } => {
                self.segments(value, path)?;
                path.push(PathKey::key(attr));
            }
            ExprKind::Subscript { value, index } => {
                self.segments(value, path)?;
                match &index.kind {
                    ExprKind::List(keys) | ExprKind::Tuple(keys) => {
                        for key in keys {
                            path.push(self.key(key)?);
                        }
                    }
                    _ => path.push(self.key(index)?),
                }
            }
            _ => return Err(self.error("expected an attribute path", expr)),
        }
        Ok(())
    }

    fn key(&self, expr: &Expr) -> Result<PathKey, DslError> {
        match &expr.kind {
            ExprKind::Constant(Constant::Str(key)) if key.contains('"') => {
                Err(self.error("attribute keys must not contain double quotes", expr))
            }
            ExprKind::Constant(Constant::Str(key)) => Ok(PathKey::key(key)),
            ExprKind::Constant(Constant::Int(index)) => Ok(PathKey::Index(*index)),
            _ => Err(self.error("subscript keys must be string or integer constants", expr)),
        }
    }
}

fn constant_value(constant: &Constant) -> Typed {
    let (value, ty) = match constant {
        Constant::None => (SqlValue::Null, ExprType::Null),
        Constant::Bool(b) => (SqlValue::Bool(*b), ExprType::Bool),
        Constant::Int(i) => (SqlValue::Int(*i), ExprType::Int),
        Constant::Float(f) => (SqlValue::Float(*f), ExprType::Float),
        Constant::Str(s) => (SqlValue::Text(s.clone()), ExprType::Str),
    };
    Typed::new(SqlExpr::Value(value), ty)
}

/// SQL for a span column, computing derived columns from stored ones.
pub fn column_expr(column: SpanColumn) -> SqlExpr {
    let sum = |a: &str, b: &str| SqlExpr::Arithmetic {
        left: Box::new(SqlExpr::column(a)),
        op: ArithmeticOp::Add,
        right: Box::new(SqlExpr::column(b)),
    };
    match column {
        SpanColumn::LatencyMs => SqlExpr::DurationMs {
            start: "spans.start_time".to_string(),
            end: "spans.end_time".to_string(),
        },
        SpanColumn::CumulativeLlmTokenCountTotal => sum(
            "spans.cumulative_llm_token_count_prompt",
            "spans.cumulative_llm_token_count_completion",
        ),
        SpanColumn::LlmTokenCountTotal => sum(
            "spans.llm_token_count_prompt",
            "spans.llm_token_count_completion",
        ),
        other => SqlExpr::column(other.stored().unwrap_or(ATTRIBUTES_COLUMN)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sql::{PostgresDialect, SqlDialect, SqlParams, SqliteDialect};
    use crate::domain::traces::dsl::parser::parse;

    fn render_with(source: &str, dialect: &dyn SqlDialect) -> (String, Vec<SqlValue>) {
        let expr = parse(source).unwrap();
        let sql = Translator::new(source).predicate(&expr).unwrap();
        let mut params = SqlParams::default();
        let text = sql.to_sql(dialect, &mut params);
        (text, params.values)
    }

    fn sqlite(source: &str) -> (String, Vec<SqlValue>) {
        render_with(source, &SqliteDialect)
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_column_comparison() {
        let (sql, params) = sqlite("span_kind == 'LLM'");
        assert_eq!(sql, "(spans.span_kind = ?)");
        assert_eq!(params, vec![text("LLM")]);
    }

    #[test]
    fn test_legacy_alias_resolves_to_column() {
        let (sql, _) = sqlite("context.span_id == 'abc'");
        assert_eq!(sql, "(spans.span_id = ?)");
        let (sql, _) = sqlite("context.trace_id == 'abc'");
        assert_eq!(sql, "(traces.trace_id = ?)");
    }

    #[test]
    fn test_attribute_path_cast_from_literal() {
        let (sql, params) = sqlite("llm.token_count.prompt > 10");
        assert_eq!(sql, "(CAST(json_extract(spans.attributes, ?) AS REAL) > ?)");
        assert_eq!(
            params,
            vec![text(r#"$."llm"."token_count"."prompt""#), SqlValue::Int(10)]
        );

        let (sql, _) = sqlite("llm.model_name == 'gpt-4'");
        assert_eq!(sql, "(CAST(json_extract(spans.attributes, ?) AS TEXT) = ?)");
    }

    #[test]
    fn test_subscript_forms_share_paths() {
        let (_, a) = sqlite("attributes[['llm', 'token_count', 'prompt']] > 10");
        let (_, b) = sqlite("attributes['llm']['token_count']['prompt'] > 10");
        let (_, c) = sqlite("llm.token_count.prompt > 10");
        assert_eq!(a, c);
        assert_eq!(b, c);

        let (_, params) = sqlite("metadata['user', 'id'] == 7");
        assert_eq!(params[0], text(r#"$."metadata"."user"."id""#));

        let (_, params) = sqlite("retrieval.documents[0].document.score >= 0.5");
        assert_eq!(
            params[0],
            text(r#"$."retrieval"."documents"[0]."document"."score""#)
        );
    }

    #[test]
    fn test_dotted_string_key_is_not_split() {
        let (_, params) = sqlite("attributes['a.b'] == 'x'");
        assert_eq!(params[0], text(r#"$."a.b""#));
    }

    #[test]
    fn test_quoted_key_is_rejected() {
        let source = r#"attributes['say "hi"'] == 'x'"#;
        let expr = parse(source).unwrap();
        let err = Translator::new(source).predicate(&expr).unwrap_err();
        assert_eq!(err.segment(), Some(r#"'say "hi"'"#));
    }

    #[test]
    fn test_membership_is_literal_substring() {
        let (sql, params) = sqlite("'y%*' in input.value");
        assert_eq!(
            sql,
            "(instr(CAST(json_extract(spans.attributes, ?) AS TEXT), ?) > 0)"
        );
        assert_eq!(params, vec![text(r#"$."input"."value""#), text("y%*")]);

        let (sql, _) = sqlite("'x' not in name");
        assert_eq!(sql, "(NOT (instr(spans.name, ?) > 0))");
    }

    #[test]
    fn test_membership_in_literal_list() {
        let (sql, params) = sqlite("name in ('a', 'b')");
        assert_eq!(sql, "(spans.name IN (?, ?))");
        assert_eq!(params, vec![text("a"), text("b")]);

        let (sql, _) = sqlite("llm.token_count.total not in [1, 2.5]");
        assert_eq!(
            sql,
            "(CAST(json_extract(spans.attributes, ?) AS REAL) NOT IN (?, ?))"
        );
    }

    #[test]
    fn test_is_none_becomes_is_null() {
        let (sql, params) = sqlite("parent_id is None");
        assert_eq!(sql, "(spans.parent_id IS NULL)");
        assert!(params.is_empty());

        let (sql, _) = sqlite("None != output.value");
        assert_eq!(sql, "(json_extract(spans.attributes, ?) IS NOT NULL)");
    }

    #[test]
    fn test_chained_comparison_expands() {
        let (sql, params) = sqlite("0 < latency_ms < 10");
        assert_eq!(
            sql,
            "((? < ((spans.end_time - spans.start_time) / 1000.0)) AND \
             (((spans.end_time - spans.start_time) / 1000.0) < ?))"
        );
        assert_eq!(params, vec![SqlValue::Int(0), SqlValue::Int(10)]);
    }

    #[test]
    fn test_arithmetic_and_string_concat() {
        let (sql, _) = sqlite("llm.token_count.prompt / 2 > 3");
        assert_eq!(
            sql,
            "((CAST(json_extract(spans.attributes, ?) AS REAL) / CAST(? AS REAL)) > ?)"
        );

        let (sql, _) = sqlite("llm.model_name + '-x' == 'a-x'");
        assert_eq!(
            sql,
            "((CAST(json_extract(spans.attributes, ?) AS TEXT) || ?) = ?)"
        );
    }

    #[test]
    fn test_unary_minus_casts_untyped_operand() {
        let (sql, _) = sqlite("-llm.token_count.prompt < 0");
        assert_eq!(
            sql,
            "((-CAST(json_extract(spans.attributes, ?) AS REAL)) < ?)"
        );
    }

    #[test]
    fn test_boolean_context_and_casts() {
        let (sql, _) = sqlite("not llm.is_streaming");
        assert_eq!(sql, "(NOT json_extract(spans.attributes, ?))");

        let (sql, _) = sqlite("str(llm.token_count.prompt) == '10' or int(x) == 1");
        assert_eq!(
            sql,
            "((CAST(json_extract(spans.attributes, ?) AS TEXT) = ?) OR \
             (CAST(json_extract(spans.attributes, ?) AS INTEGER) = ?))"
        );
    }

    #[test]
    fn test_timestamp_literal_is_parsed() {
        let (sql, params) = sqlite("start_time >= '2024-01-01T00:00:00Z'");
        assert_eq!(sql, "(spans.start_time >= ?)");
        assert_eq!(params, vec![SqlValue::Int(1_704_067_200_000_000)]);

        let source = "start_time >= 'yesterday'";
        let expr = parse(source).unwrap();
        let err = Translator::new(source).predicate(&expr).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn test_eval_columns() {
        let mut columns = EvalColumns::default();
        columns.insert(
            "span_annotation_0_score_000001".to_string(),
            EvalColumn {
                table: "span_annotation_0".to_string(),
                attribute: "score".to_string(),
            },
        );
        let source = "span_annotation_0_score_000001 > 0.5";
        let expr = parse(source).unwrap();
        let sql = Translator::new(source)
            .with_eval_columns(&columns)
            .predicate(&expr)
            .unwrap();
        let mut params = SqlParams::default();
        assert_eq!(
            sql.to_sql(&SqliteDialect, &mut params),
            "(span_annotation_0.score > ?)"
        );
    }

    #[test]
    fn test_postgres_rendering() {
        let (sql, params) = render_with("llm.token_count.prompt > 10", &PostgresDialect);
        assert_eq!(
            sql,
            "(((spans.attributes #>> $1::TEXT[]))::DOUBLE PRECISION > $2::BIGINT)"
        );
        assert_eq!(
            params[0],
            SqlValue::TextArray(vec!["llm".into(), "token_count".into(), "prompt".into()])
        );

        let (sql, _) = render_with("'y%*' in input.value", &PostgresDialect);
        assert_eq!(sql, "(strpos((spans.attributes #>> $1::TEXT[]), $2::TEXT) > 0)");
    }

    #[test]
    fn test_projection_output_encoding() {
        let expr = parse("retrieval.documents").unwrap();
        let typed = Translator::new("retrieval.documents").translate(&expr).unwrap();
        assert_eq!(typed.ty, ExprType::Json);
        let mut params = SqlParams::default();
        assert_eq!(
            typed.output().to_sql(&SqliteDialect, &mut params),
            "json((spans.attributes -> ?))"
        );

        let expr = parse("llm_token_count_total").unwrap();
        let typed = Translator::new("llm_token_count_total").translate(&expr).unwrap();
        let mut params = SqlParams::default();
        assert_eq!(
            typed.output().to_sql(&SqliteDialect, &mut params),
            "json_quote((spans.llm_token_count_prompt + spans.llm_token_count_completion))"
        );
    }
}
