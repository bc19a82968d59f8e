//! Expression tree for the span query language.
//!
//! Every node carries the byte range it was parsed from so that errors can
//! quote the offending source and evaluation references can be spliced out of
//! the original text.

use std::fmt;

/// Byte range into the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Source text covered by this span, empty if out of range.
    pub fn slice(self, source: &str) -> &str {
        source.get(self.start..self.end).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOperator>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Name(String),
    Constant(Constant),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOperator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMult,
    BitOr,
    BitXor,
    BitAnd,
    LShift,
    RShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    USub,
    UAdd,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl fmt::Display for BinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOperator::Add => "+",
            BinOperator::Sub => "-",
            BinOperator::Mult => "*",
            BinOperator::Div => "/",
            BinOperator::FloorDiv => "//",
            BinOperator::Mod => "%",
            BinOperator::Pow => "**",
            BinOperator::MatMult => "@",
            BinOperator::BitOr => "|",
            BinOperator::BitXor => "^",
            BinOperator::BitAnd => "&",
            BinOperator::LShift => "<<",
            BinOperator::RShift => ">>",
        };
        f.write_str(symbol)
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Source text of this node.
    pub fn source<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, ExprKind::Name(n) if n == name)
    }

    /// Dotted form of a pure `Name(.attr)*` chain, e.g. `context.span_id`.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name(name) => Some(name.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_name().map(|prefix| format!("{prefix}.{attr}"))
            }
            _ => None,
        }
    }

    /// Name inside `evals["name"]` or `annotations["name"]`.
    pub fn eval_name(&self) -> Option<&str> {
        let ExprKind::Subscript { value, index } = &self.kind else {
            return None;
        };
        if !(value.is_name(EVALS) || value.is_name(ANNOTATIONS)) {
            return None;
        }
        match &index.kind {
            ExprKind::Constant(Constant::Str(name)) => Some(name),
            _ => None,
        }
    }

    /// `(name, attribute)` for `evals["name"].attribute`.
    pub fn eval_attribute(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ExprKind::Attribute { value, attr } => value.eval_name().map(|name| (name, attr.as_str())),
            _ => None,
        }
    }
}

/// Collection name for evaluation references.
pub const EVALS: &str = "evals";
/// Synonym of [`EVALS`].
pub const ANNOTATIONS: &str = "annotations";
