//! Whitelist validation of parsed expressions.
//!
//! Runs before any translation so that a disallowed construct is always
//! reported against the text the caller wrote.

use super::ast::{BinOperator, CmpOperator, Constant, Expr, ExprKind, UnaryOperator};
use super::columns::EVAL_ATTRIBUTES;
use super::error::DslError;
use crate::utils::string::{best_match, disjunction};

/// Minimum similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.75;

const CAST_FUNCTIONS: &[&str] = &["str", "float", "int"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Root must be boolean; evaluation references allowed
    Filter,
    /// Any value expression; no evaluation references
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Value,
    MembershipTarget,
}

pub struct Validator<'a> {
    source: &'a str,
    mode: Mode,
    /// `None` accepts any evaluation name
    valid_eval_names: Option<&'a [String]>,
}

impl<'a> Validator<'a> {
    pub fn new(source: &'a str, mode: Mode, valid_eval_names: Option<&'a [String]>) -> Self {
        Self {
            source,
            mode,
            valid_eval_names,
        }
    }

    pub fn validate(&self, root: &Expr) -> Result<(), DslError> {
        if self.mode == Mode::Filter && !is_boolean_root(root) {
            return Err(self.error(
                "filter must be a comparison or a boolean expression",
                root,
            ));
        }
        self.check(root, Position::Value)
    }

    fn error(&self, message: impl Into<String>, expr: &Expr) -> DslError {
        DslError::syntax(message, expr.source(self.source))
    }

    fn check(&self, expr: &Expr, position: Position) -> Result<(), DslError> {
        match &expr.kind {
            ExprKind::BoolOp { values, .. } => values
                .iter()
                .try_for_each(|value| self.check(value, Position::Value)),
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                self.check(left, Position::Value)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let position = match op {
                        CmpOperator::In | CmpOperator::NotIn => Position::MembershipTarget,
                        _ => Position::Value,
                    };
                    self.check(comparator, position)?;
                }
                Ok(())
            }
            ExprKind::UnaryOp { op, operand } => match op {
                UnaryOperator::Invert => Err(self.error("bitwise inversion is not supported", expr)),
                _ => self.check(operand, Position::Value),
            },
            ExprKind::BinOp { left, op, right } => match op {
                BinOperator::Add | BinOperator::Sub | BinOperator::Mult | BinOperator::Div => {
                    self.check(left, Position::Value)?;
                    self.check(right, Position::Value)
                }
                other => Err(self.error(format!("operator `{other}` is not supported"), expr)),
            },
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let is_cast = matches!(&func.kind, ExprKind::Name(name)
                    if CAST_FUNCTIONS.contains(&name.as_str()));
                if !is_cast {
                    return Err(self.error(
                        "only str(), float() and int() calls are supported",
                        expr,
                    ));
                }
                if args.len() != 1 || !keywords.is_empty() {
                    return Err(self.error("type casts take exactly one argument", expr));
                }
                self.check(&args[0], Position::Value)
            }
            ExprKind::Attribute { value, attr } => {
                if let Some(name) = value.eval_name() {
                    return self.check_eval(value, name, expr, attr);
                }
                self.check_path(value).map_err(|_| {
                    self.error("attribute access is only supported on attribute paths", expr)
                })
            }
            ExprKind::Subscript { value, index } => {
                if value.is_name(super::ast::EVALS) || value.is_name(super::ast::ANNOTATIONS) {
                    return Err(self.error(
                        format!(
                            "evaluations must be followed by {}",
                            disjunction(&[".label", ".score", ".explanation"])
                        ),
                        expr,
                    ));
                }
                self.check_path(value)?;
                self.check_key(index)
            }
            ExprKind::Name(name) => {
                if name == super::ast::EVALS || name == super::ast::ANNOTATIONS {
                    return Err(self.error(
                        "evaluations must be referenced as evals[\"name\"].label",
                        expr,
                    ));
                }
                Ok(())
            }
            ExprKind::Constant(_) => Ok(()),
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                if position != Position::MembershipTarget {
                    return Err(self.error(
                        "lists and tuples are only supported on the right side of `in`",
                        expr,
                    ));
                }
                items
                    .iter()
                    .try_for_each(|item| self.check(item, Position::Value))
            }
        }
    }

    /// A chain of names, attributes and constant subscripts.
    fn check_path(&self, expr: &Expr) -> Result<(), DslError> {
        match &expr.kind {
            ExprKind::Name(_) => self.check(expr, Position::Value),
            ExprKind::Attribute { value, .. } if value.eval_name().is_none() => {
                self.check_path(value)
            }
            ExprKind::Subscript { .. } => self.check(expr, Position::Value),
            _ => Err(self.error("subscripts are only supported on attribute paths", expr)),
        }
    }

    fn check_key(&self, index: &Expr) -> Result<(), DslError> {
        let is_key = |e: &Expr| {
            matches!(
                &e.kind,
                ExprKind::Constant(Constant::Str(_)) | ExprKind::Constant(Constant::Int(_))
            )
        };
        let valid = match &index.kind {
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                !items.is_empty() && items.iter().all(is_key)
            }
            _ => is_key(index),
        };
        if valid {
            Ok(())
        } else {
            Err(self.error(
                "subscript keys must be string or integer constants",
                index,
            ))
        }
    }

    fn check_eval(
        &self,
        subscript: &Expr,
        name: &str,
        attribute: &Expr,
        attr: &str,
    ) -> Result<(), DslError> {
        if self.mode == Mode::Projection {
            return Err(self.error(
                "evaluations are only supported in filters",
                attribute,
            ));
        }
        if name.is_empty() {
            return Err(self.error("evaluation name must not be empty", subscript));
        }
        if let Some(valid) = self.valid_eval_names
            && !valid.iter().any(|v| v == name)
        {
            let choices: Vec<&str> = valid.iter().map(String::as_str).collect();
            return Err(self.error(
                unknown_choice_message("evaluation name", name, &choices),
                subscript,
            ));
        }
        if !EVAL_ATTRIBUTES.contains(&attr) {
            return Err(self.error(
                unknown_choice_message("evaluation attribute", attr, EVAL_ATTRIBUTES),
                attribute,
            ));
        }
        Ok(())
    }
}

fn is_boolean_root(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::BoolOp { .. } | ExprKind::Compare { .. } => true,
        ExprKind::UnaryOp {
            op: UnaryOperator::Not,
            operand,
        } => is_boolean_root(operand),
        _ => false,
    }
}

fn unknown_choice_message(what: &str, value: &str, choices: &[&str]) -> String {
    if let Some((choice, score)) = best_match(value, choices.iter().copied())
        && score > SUGGESTION_THRESHOLD
    {
        return format!("unknown {what}; did you mean \"{choice}\"?");
    }
    if choices.is_empty() {
        return format!("unknown {what}; no choices are available");
    }
    let quoted: Vec<String> = choices.iter().map(|c| format!("\"{c}\"")).collect();
    format!("unknown {what}; valid choices are: {}", disjunction(&quoted))
}
