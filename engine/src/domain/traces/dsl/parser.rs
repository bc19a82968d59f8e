//! Recursive-descent parser for the expression subset of Python.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `|`, `^`,
//! `&`, shifts, `+ -`, `* / // % @`, unary `+ - ~`, `**`, then primaries
//! with `.attr`, `(args)` and `[key]` trailers. Constructs with no meaning
//! in a span query (lambda, conditional expressions, comprehensions, slices,
//! dict and set displays, starred arguments) are rejected here.

use super::ast::{
    BinOperator, BoolOperator, CmpOperator, Constant, Expr, ExprKind, Keyword, Span,
    UnaryOperator,
};
use super::error::DslError;
use super::lexer::{Token, TokenKind, tokenize};

/// Parse a complete expression.
pub fn parse(source: &str) -> Result<Expr, DslError> {
    if source.trim().is_empty() {
        return Err(DslError::syntax("expression is empty", source));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        TokenKind::End => Ok(expr),
        _ => Err(parser.unexpected()),
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::End)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Span {
        let span = self.span();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        span
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Op(o) if *o == op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn eat_op(&mut self, op: &str) -> Option<Span> {
        self.at_op(op).then(|| self.advance())
    }

    fn eat_keyword(&mut self, keyword: &str) -> Option<Span> {
        self.at_keyword(keyword).then(|| self.advance())
    }

    fn expect_op(&mut self, op: &str) -> Result<Span, DslError> {
        self.eat_op(op).ok_or_else(|| self.unexpected())
    }

    fn unexpected(&self) -> DslError {
        let span = self.span();
        match self.peek() {
            TokenKind::End => DslError::syntax("unexpected end of expression", self.source),
            _ => DslError::syntax("unexpected token", span.slice(self.source)),
        }
    }

    fn unsupported(&self, what: &str, span: Span) -> DslError {
        DslError::syntax(format!("{what} are not supported"), span.slice(self.source))
    }

    // ========================================================================
    // Grammar
    // ========================================================================

    fn expression(&mut self) -> Result<Expr, DslError> {
        if let Some(span) = self.eat_keyword("lambda") {
            return Err(self.unsupported("lambda expressions", span.to(self.rest_span())));
        }
        let expr = self.or_test()?;
        if self.at_keyword("if") {
            return Err(self.unsupported("conditional expressions", expr.span.to(self.rest_span())));
        }
        if self.at_op(":=") {
            return Err(self.unsupported("assignment expressions", expr.span.to(self.rest_span())));
        }
        Ok(expr)
    }

    fn rest_span(&self) -> Span {
        let start = self.span().start;
        Span::new(start, self.source.len())
    }

    fn or_test(&mut self) -> Result<Expr, DslError> {
        self.bool_op("or", BoolOperator::Or, Self::and_test)
    }

    fn and_test(&mut self) -> Result<Expr, DslError> {
        self.bool_op("and", BoolOperator::And, Self::not_test)
    }

    fn bool_op(
        &mut self,
        keyword: &str,
        op: BoolOperator,
        operand: fn(&mut Self) -> Result<Expr, DslError>,
    ) -> Result<Expr, DslError> {
        let first = operand(self)?;
        if !self.at_keyword(keyword) {
            return Ok(first);
        }
        let mut span = first.span;
        let mut values = vec![first];
        while self.eat_keyword(keyword).is_some() {
            let next = operand(self)?;
            span = span.to(next.span);
            values.push(next);
        }
        Ok(Expr::new(ExprKind::BoolOp { op, values }, span))
    }

    fn not_test(&mut self) -> Result<Expr, DslError> {
        if let Some(start) = self.eat_keyword("not") {
            let operand = self.not_test()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, DslError> {
        let left = self.bit_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        let mut span = left.span;
        while let Some(op) = self.comparison_operator() {
            let right = self.bit_or()?;
            span = span.to(right.span);
            ops.push(op);
            comparators.push(right);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            span,
        ))
    }

    fn comparison_operator(&mut self) -> Option<CmpOperator> {
        let op = match self.peek().clone() {
            TokenKind::Op("==") => CmpOperator::Eq,
            TokenKind::Op("!=") => CmpOperator::NotEq,
            TokenKind::Op("<") => CmpOperator::Lt,
            TokenKind::Op("<=") => CmpOperator::LtE,
            TokenKind::Op(">") => CmpOperator::Gt,
            TokenKind::Op(">=") => CmpOperator::GtE,
            TokenKind::Keyword("in") => CmpOperator::In,
            TokenKind::Keyword("not") if matches!(self.peek_nth(1), TokenKind::Keyword("in")) => {
                self.advance();
                CmpOperator::NotIn
            }
            TokenKind::Keyword("is") => {
                if matches!(self.peek_nth(1), TokenKind::Keyword("not")) {
                    self.advance();
                    CmpOperator::IsNot
                } else {
                    CmpOperator::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn bit_or(&mut self) -> Result<Expr, DslError> {
        self.binary(&[("|", BinOperator::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr, DslError> {
        self.binary(&[("^", BinOperator::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr, DslError> {
        self.binary(&[("&", BinOperator::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> Result<Expr, DslError> {
        self.binary(
            &[("<<", BinOperator::LShift), (">>", BinOperator::RShift)],
            Self::arith,
        )
    }

    fn arith(&mut self) -> Result<Expr, DslError> {
        self.binary(
            &[("+", BinOperator::Add), ("-", BinOperator::Sub)],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, DslError> {
        self.binary(
            &[
                ("*", BinOperator::Mult),
                ("/", BinOperator::Div),
                ("//", BinOperator::FloorDiv),
                ("%", BinOperator::Mod),
                ("@", BinOperator::MatMult),
            ],
            Self::factor,
        )
    }

    /// Left-associative binary operator level.
    fn binary(
        &mut self,
        operators: &[(&str, BinOperator)],
        operand: fn(&mut Self) -> Result<Expr, DslError>,
    ) -> Result<Expr, DslError> {
        let mut left = operand(self)?;
        loop {
            let Some(op) = operators
                .iter()
                .find(|(symbol, _)| self.at_op(symbol))
                .map(|(_, op)| *op)
            else {
                return Ok(left);
            };
            self.advance();
            let right = operand(self)?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn factor(&mut self) -> Result<Expr, DslError> {
        let op = match self.peek() {
            TokenKind::Op("-") => UnaryOperator::USub,
            TokenKind::Op("+") => UnaryOperator::UAdd,
            TokenKind::Op("~") => UnaryOperator::Invert,
            _ => return self.power(),
        };
        let start = self.advance();
        let operand = self.factor()?;
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn power(&mut self) -> Result<Expr, DslError> {
        let base = self.primary()?;
        if self.eat_op("**").is_none() {
            return Ok(base);
        }
        let exponent = self.factor()?;
        let span = base.span.to(exponent.span);
        Ok(Expr::new(
            ExprKind::BinOp {
                left: Box::new(base),
                op: BinOperator::Pow,
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn primary(&mut self) -> Result<Expr, DslError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op(".").is_some() {
                let span = self.span();
                let TokenKind::Name(attr) = self.peek().clone() else {
                    return Err(self.unexpected());
                };
                self.advance();
                let span = expr.span.to(span);
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    span,
                );
            } else if self.eat_op("(").is_some() {
                let (args, keywords) = self.call_arguments()?;
                let end = self.expect_op(")")?;
                let span = expr.span.to(end);
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    },
                    span,
                );
            } else if self.eat_op("[").is_some() {
                let index = self.subscript_key()?;
                let end = self.expect_op("]")?;
                let span = expr.span.to(end);
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), DslError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_op(")") {
            if self.at_op("*") || self.at_op("**") {
                let span = self.span();
                return Err(self.unsupported("starred arguments", span.to(self.rest_span())));
            }
            let is_keyword = matches!(self.peek(), TokenKind::Name(_))
                && matches!(self.peek_nth(1), TokenKind::Op("="));
            if is_keyword {
                let TokenKind::Name(name) = self.peek().clone() else {
                    return Err(self.unexpected());
                };
                self.advance();
                self.advance();
                let value = self.expression()?;
                keywords.push(Keyword { name, value });
            } else {
                let arg = self.expression()?;
                if self.at_keyword("for") {
                    return Err(self.unsupported("comprehensions", arg.span.to(self.rest_span())));
                }
                args.push(arg);
            }
            if self.eat_op(",").is_none() {
                break;
            }
        }
        Ok((args, keywords))
    }

    /// `x[key]` or `x[a, b]`, which is a tuple key.
    fn subscript_key(&mut self) -> Result<Expr, DslError> {
        if self.at_op(":") {
            let span = self.span();
            return Err(self.unsupported("slices", span));
        }
        let first = self.expression()?;
        if self.at_op(":") {
            let span = first.span.to(self.span());
            return Err(self.unsupported("slices", span));
        }
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut span = first.span;
        let mut items = vec![first];
        while self.eat_op(",").is_some() {
            if self.at_op("]") {
                break;
            }
            let item = self.expression()?;
            span = span.to(item.span);
            items.push(item);
        }
        Ok(Expr::new(ExprKind::Tuple(items), span))
    }

    fn atom(&mut self) -> Result<Expr, DslError> {
        let span = self.span();
        let kind = match self.peek().clone() {
            TokenKind::Name(name) => ExprKind::Name(name),
            TokenKind::Int(value) => ExprKind::Constant(Constant::Int(value)),
            TokenKind::Float(value) => ExprKind::Constant(Constant::Float(value)),
            TokenKind::Keyword("None") => ExprKind::Constant(Constant::None),
            TokenKind::Keyword("True") => ExprKind::Constant(Constant::Bool(true)),
            TokenKind::Keyword("False") => ExprKind::Constant(Constant::Bool(false)),
            TokenKind::Str(_) => return self.strings(),
            TokenKind::Op("(") => return self.parenthesized(),
            TokenKind::Op("[") => return self.list(),
            TokenKind::Op("{") => {
                return Err(self.unsupported("dict and set displays", span.to(self.rest_span())));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }

    /// Adjacent string literals concatenate.
    fn strings(&mut self) -> Result<Expr, DslError> {
        let mut value = String::new();
        let mut span = self.span();
        while let TokenKind::Str(part) = self.peek().clone() {
            span = span.to(self.advance());
            value.push_str(&part);
        }
        Ok(Expr::new(ExprKind::Constant(Constant::Str(value)), span))
    }

    fn parenthesized(&mut self) -> Result<Expr, DslError> {
        let start = self.advance();
        if let Some(end) = self.eat_op(")") {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), start.to(end)));
        }
        let first = self.expression()?;
        if self.at_keyword("for") {
            return Err(self.unsupported("generator expressions", start.to(self.rest_span())));
        }
        if let Some(_end) = self.eat_op(")") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",").is_some() {
            if self.at_op(")") {
                break;
            }
            items.push(self.expression()?);
        }
        let end = self.expect_op(")")?;
        Ok(Expr::new(ExprKind::Tuple(items), start.to(end)))
    }

    fn list(&mut self) -> Result<Expr, DslError> {
        let start = self.advance();
        let mut items = Vec::new();
        while !self.at_op("]") {
            let item = self.expression()?;
            if self.at_keyword("for") {
                return Err(self.unsupported("comprehensions", start.to(self.rest_span())));
            }
            items.push(item);
            if self.eat_op(",").is_none() {
                break;
            }
        }
        let end = self.expect_op("]")?;
        Ok(Expr::new(ExprKind::List(items), start.to(end)))
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
