//! Dialect-neutral SQL expressions and SELECT statements.
//!
//! Expressions are kept structured until the statement is rendered so that
//! parameters are collected in the same order their placeholders appear in
//! the final text, which SQLite's positional `?` requires.

use super::dialect::{CastType, JsonCast};
use super::params::{PathKey, SqlParams, SqlValue};
use super::SqlDialect;
use crate::utils::sql::quote_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtE => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtE => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// Column reference or other fixed SQL text without parameters
    Column(String),
    /// Bound literal
    Value(SqlValue),
    /// Path lookup inside a JSON column; an empty path is the whole column
    Json {
        column: String,
        path: Vec<PathKey>,
        cast: JsonCast,
    },
    /// JSON array at a path, NULL for non-arrays
    JsonArray { column: String, path: Vec<PathKey> },
    /// Milliseconds between two microsecond columns
    DurationMs { start: String, end: String },
    Cast {
        expr: Box<SqlExpr>,
        to: CastType,
    },
    Arithmetic {
        left: Box<SqlExpr>,
        op: ArithmeticOp,
        right: Box<SqlExpr>,
    },
    Concat {
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Compare {
        left: Box<SqlExpr>,
        op: CompareOp,
        right: Box<SqlExpr>,
    },
    IsNull {
        expr: Box<SqlExpr>,
        negated: bool,
    },
    InList {
        expr: Box<SqlExpr>,
        items: Vec<SqlExpr>,
        negated: bool,
    },
    TextContains {
        haystack: Box<SqlExpr>,
        needle: Box<SqlExpr>,
        negated: bool,
    },
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
    /// `EXISTS (subquery)`; a subquery without columns selects `1`
    Exists {
        subquery: Box<SelectStatement>,
        negated: bool,
    },
    Negate(Box<SqlExpr>),
    /// Scalar encoded as JSON text
    JsonOutput(Box<SqlExpr>),
    /// JSON document encoded as JSON text
    DocumentOutput(Box<SqlExpr>),
    /// Unnested array element is an object
    IsJsonObject(Box<SqlExpr>),
    /// Text of an unnested element: strings verbatim, JSON otherwise
    ElementText(Box<SqlExpr>),
    /// Aggregate of `value` joined by `separator`, ordered by `order`
    OrderedConcat {
        value: Box<SqlExpr>,
        separator: Box<SqlExpr>,
        order: String,
    },
}

impl SqlExpr {
    pub fn column(sql: impl Into<String>) -> Self {
        SqlExpr::Column(sql.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        SqlExpr::Value(SqlValue::Text(value.into()))
    }

    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Compare {
            left: Box::new(left),
            op: CompareOp::Eq,
            right: Box::new(right),
        }
    }

    pub fn compare(left: SqlExpr, op: CompareOp, right: SqlExpr) -> Self {
        SqlExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn cast(self, to: CastType) -> Self {
        SqlExpr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    /// Render to SQL text, binding parameters in textual order.
    pub fn to_sql(&self, dialect: &dyn SqlDialect, params: &mut SqlParams) -> String {
        match self {
            SqlExpr::Column(sql) => sql.clone(),
            SqlExpr::Value(SqlValue::Null) => "NULL".to_string(),
            SqlExpr::Value(value) => params.push(dialect, value.clone()),
            SqlExpr::Json { column, path, cast } => {
                if path.is_empty() {
                    return match cast {
                        JsonCast::Value | JsonCast::Json => column.clone(),
                        JsonCast::Text => dialect.cast(column, CastType::Text),
                        JsonCast::Float => dialect.cast(column, CastType::Float),
                        JsonCast::Integer => dialect.cast(column, CastType::Integer),
                        JsonCast::Boolean => dialect.cast(column, CastType::Boolean),
                    };
                }
                let path = params.push(dialect, dialect.json_path(path));
                dialect.json_extract(column, &path, *cast)
            }
            SqlExpr::JsonArray { column, path } => {
                let path = params.push(dialect, dialect.json_path(path));
                dialect.extract_array_as_json(column, &path)
            }
            SqlExpr::DurationMs { start, end } => dialect.duration_ms(start, end),
            SqlExpr::Cast { expr, to } => dialect.cast(&expr.to_sql(dialect, params), *to),
            SqlExpr::Arithmetic { left, op, right } => {
                let left = left.to_sql(dialect, params);
                let right = right.to_sql(dialect, params);
                let symbol = match op {
                    ArithmeticOp::Add => "+",
                    ArithmeticOp::Sub => "-",
                    ArithmeticOp::Mul => "*",
                    ArithmeticOp::Div => "/",
                };
                format!("({left} {symbol} {right})")
            }
            SqlExpr::Concat { left, right } => {
                let left = left.to_sql(dialect, params);
                let right = right.to_sql(dialect, params);
                dialect.concat(&left, &right)
            }
            SqlExpr::Compare { left, op, right } => {
                let left = left.to_sql(dialect, params);
                let right = right.to_sql(dialect, params);
                format!("({left} {} {right})", op.symbol())
            }
            SqlExpr::IsNull { expr, negated } => {
                let expr = expr.to_sql(dialect, params);
                if *negated {
                    format!("({expr} IS NOT NULL)")
                } else {
                    format!("({expr} IS NULL)")
                }
            }
            SqlExpr::InList {
                expr,
                items,
                negated,
            } => {
                if items.is_empty() {
                    return if *negated { "(1 = 1)" } else { "(1 = 0)" }.to_string();
                }
                let expr = expr.to_sql(dialect, params);
                let items: Vec<String> = items.iter().map(|i| i.to_sql(dialect, params)).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("({expr} {keyword} ({}))", items.join(", "))
            }
            SqlExpr::TextContains {
                haystack,
                needle,
                negated,
            } => {
                let haystack = haystack.to_sql(dialect, params);
                let needle = needle.to_sql(dialect, params);
                let contains = dialect.text_contains(&haystack, &needle);
                if *negated {
                    format!("(NOT {contains})")
                } else {
                    contains
                }
            }
            SqlExpr::And(items) => join_bool(items, "AND", dialect, params),
            SqlExpr::Or(items) => join_bool(items, "OR", dialect, params),
            SqlExpr::Not(expr) => format!("(NOT {})", expr.to_sql(dialect, params)),
            SqlExpr::Exists { subquery, negated } => {
                let subquery = subquery.to_sql(dialect, params);
                if *negated {
                    format!("(NOT EXISTS ({subquery}))")
                } else {
                    format!("EXISTS ({subquery})")
                }
            }
            SqlExpr::Negate(expr) => format!("(-{})", expr.to_sql(dialect, params)),
            SqlExpr::JsonOutput(expr) => dialect.json_output(&expr.to_sql(dialect, params)),
            SqlExpr::DocumentOutput(expr) => {
                dialect.json_document_output(&expr.to_sql(dialect, params))
            }
            SqlExpr::IsJsonObject(expr) => dialect.is_json_object(&expr.to_sql(dialect, params)),
            SqlExpr::ElementText(expr) => dialect.element_text(&expr.to_sql(dialect, params)),
            SqlExpr::OrderedConcat {
                value,
                separator,
                order,
            } => {
                let value = value.to_sql(dialect, params);
                let separator = separator.to_sql(dialect, params);
                dialect.build_ordered_concat(&value, &separator, order)
            }
        }
    }
}

fn join_bool(
    items: &[SqlExpr],
    keyword: &str,
    dialect: &dyn SqlDialect,
    params: &mut SqlParams,
) -> String {
    match items {
        [] if keyword == "AND" => "(1 = 1)".to_string(),
        [] => "(1 = 0)".to_string(),
        [only] => only.to_sql(dialect, params),
        _ => {
            let parts: Vec<String> = items.iter().map(|i| i.to_sql(dialect, params)).collect();
            format!("({})", parts.join(&format!(" {keyword} ")))
        }
    }
}

// ============================================================================
// SELECT statements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    /// Table with optional alias, e.g. `span_annotations AS span_annotation_0`
    pub table: String,
    pub on: SqlExpr,
}

#[derive(Debug, Clone, PartialEq)]
struct SelectColumn {
    expr: SqlExpr,
    alias: String,
}

/// A SELECT statement assembled from structured parts.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    ctes: Vec<(String, SelectStatement)>,
    columns: Vec<SelectColumn>,
    from: String,
    joins: Vec<Join>,
    /// Raw join clauses such as lateral array expansion
    raw_joins: Vec<String>,
    conditions: Vec<SqlExpr>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl SelectStatement {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            ctes: Vec::new(),
            columns: Vec::new(),
            from: table.into(),
            joins: Vec::new(),
            raw_joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn with_cte(mut self, name: impl Into<String>, statement: SelectStatement) -> Self {
        self.ctes.push((name.into(), statement));
        self
    }

    pub fn column(mut self, expr: SqlExpr, alias: impl Into<String>) -> Self {
        self.columns.push(SelectColumn {
            expr,
            alias: alias.into(),
        });
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn raw_join(mut self, clause: impl Into<String>) -> Self {
        self.raw_joins.push(clause.into());
        self
    }

    pub fn filter(mut self, condition: SqlExpr) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn has_join(&self, table: &str) -> bool {
        self.joins.iter().any(|join| join.table == table)
    }

    pub fn to_sql(&self, dialect: &dyn SqlDialect, params: &mut SqlParams) -> String {
        let mut sql = String::new();
        if !self.ctes.is_empty() {
            let ctes: Vec<String> = self
                .ctes
                .iter()
                .map(|(name, statement)| format!("{name} AS ({})", statement.to_sql(dialect, params)))
                .collect();
            sql.push_str(&format!("WITH {} ", ctes.join(", ")));
        }

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} AS {}", c.expr.to_sql(dialect, params), quote_identifier(&c.alias)))
            .collect();
        let columns = if columns.is_empty() {
            "1".to_string()
        } else {
            columns.join(", ")
        };
        sql.push_str(&format!("SELECT {columns} FROM {}", self.from));

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::LeftOuter => "LEFT OUTER JOIN",
            };
            let on = join.on.to_sql(dialect, params);
            sql.push_str(&format!(" {keyword} {} ON {on}", join.table));
        }
        for clause in &self.raw_joins {
            sql.push(' ');
            sql.push_str(clause);
        }

        if !self.conditions.is_empty() {
            let conditions: Vec<String> = self
                .conditions
                .iter()
                .map(|c| c.to_sql(dialect, params))
                .collect();
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push(' ');
            sql.push_str(&dialect.limit(limit));
        }
        sql
    }
}
