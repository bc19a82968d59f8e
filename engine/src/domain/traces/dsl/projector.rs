//! Compiled column projections.

use super::columns::{ExprType, SpanColumn};
use super::error::DslError;
use super::parser::parse;
use super::translate::{Translator, Typed, column_expr};
use super::validate::{Mode, Validator};
use crate::data::sql::{SqlDialect, SqlExpr, SqlParams};

/// A single value expression selected for every span.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    expression: String,
    value: Typed,
}

impl Projector {
    pub fn new(expression: &str) -> Result<Self, DslError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(DslError::InvalidArgument(
                "projection expression must not be empty".to_string(),
            ));
        }
        let root = parse(expression)?;
        Validator::new(expression, Mode::Projection, None).validate(&root)?;
        let value = Translator::new(expression).translate(&root)?;
        Ok(Self {
            expression: expression.to_string(),
            value,
        })
    }

    /// Projection of a known span column, labeled `expression`.
    pub fn span_column(expression: &str, column: SpanColumn) -> Self {
        Self {
            expression: expression.to_string(),
            value: Typed {
                expr: column_expr(column),
                ty: column.expr_type(),
            },
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn expr_type(&self) -> ExprType {
        self.value.ty
    }

    /// The projected value encoded as JSON text.
    pub fn output(&self) -> SqlExpr {
        self.value.clone().output()
    }

    /// The raw JSON array at this path, for explode and concat.
    pub fn array(&self) -> Option<SqlExpr> {
        match &self.value.expr {
            SqlExpr::Json { column, path, .. } => Some(SqlExpr::JsonArray {
                column: column.clone(),
                path: path.clone(),
            }),
            _ => None,
        }
    }

    pub fn render(&self, dialect: &dyn SqlDialect) -> (String, SqlParams) {
        let mut params = SqlParams::default();
        let sql = self.output().to_sql(dialect, &mut params);
        (sql, params)
    }
}
