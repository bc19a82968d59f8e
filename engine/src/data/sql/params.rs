//! Bound parameter values

use super::SqlDialect;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
}

/// One step of a JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Key(String),
    Index(i64),
}

impl PathKey {
    pub fn key(key: impl Into<String>) -> Self {
        PathKey::Key(key.into())
    }
}

impl std::fmt::Display for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKey::Key(key) => f.write_str(key),
            PathKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Parameters collected while rendering a statement, in placeholder order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlParams {
    pub values: Vec<SqlValue>,
}

impl SqlParams {
    /// Bind a value and return its placeholder.
    pub fn push(&mut self, dialect: &dyn SqlDialect, value: SqlValue) -> String {
        let placeholder = dialect.value_placeholder(self.values.len() + 1, &value);
        self.values.push(value);
        placeholder
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
