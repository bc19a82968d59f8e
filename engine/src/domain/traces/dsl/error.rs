//! DSL error types

use thiserror::Error;

use crate::data::DataError;

/// Compile-time error for filter, projection and query expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DslError {
    /// Malformed or disallowed expression. `segment` is the offending source.
    #[error("invalid expression `{segment}`: {message}")]
    Syntax { message: String, segment: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl DslError {
    pub fn syntax(message: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            segment: segment.into(),
        }
    }

    pub fn segment(&self) -> Option<&str> {
        match self {
            DslError::Syntax { segment, .. } => Some(segment),
            DslError::InvalidArgument(_) => None,
        }
    }
}

/// Error raised while executing a [`SpanQuery`](super::SpanQuery).
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Dsl(#[from] DslError),

    #[error(transparent)]
    Data(#[from] DataError),

    /// The database returned a value that is not valid JSON text
    #[error("failed to decode column {column}: {message}")]
    Decode { column: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_quotes_segment() {
        let err = DslError::syntax("unsupported call", "os.system('x')");
        assert_eq!(
            err.to_string(),
            "invalid expression `os.system('x')`: unsupported call"
        );
        assert_eq!(err.segment(), Some("os.system('x')"));
    }

    #[test]
    fn test_invalid_argument_has_no_segment() {
        let err = DslError::InvalidArgument("empty key".to_string());
        assert_eq!(err.segment(), None);
        assert_eq!(err.to_string(), "invalid argument: empty key");
    }
}
