//! Span columns addressable by bare name in expressions.

/// Value type of an expression as far as SQL generation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Str,
    Int,
    Float,
    Bool,
    /// Microseconds since epoch, rendered as RFC 3339 in results
    Timestamp,
    /// A JSON leaf or subtree of unknown type
    Json,
    /// A whole JSON document column
    Document,
    Null,
}

impl ExprType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ExprType::Int | ExprType::Float | ExprType::Timestamp)
    }

    pub fn is_untyped(self) -> bool {
        matches!(self, ExprType::Json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanColumn {
    SpanId,
    TraceId,
    ParentId,
    SpanKind,
    Name,
    StatusCode,
    StatusMessage,
    StartTime,
    EndTime,
    Events,
    Attributes,
    LatencyMs,
    CumulativeErrorCount,
    CumulativeLlmTokenCountPrompt,
    CumulativeLlmTokenCountCompletion,
    CumulativeLlmTokenCountTotal,
    LlmTokenCountPrompt,
    LlmTokenCountCompletion,
    LlmTokenCountTotal,
}

impl SpanColumn {
    pub const ALL: [SpanColumn; 19] = [
        SpanColumn::SpanId,
        SpanColumn::TraceId,
        SpanColumn::ParentId,
        SpanColumn::SpanKind,
        SpanColumn::Name,
        SpanColumn::StatusCode,
        SpanColumn::StatusMessage,
        SpanColumn::StartTime,
        SpanColumn::EndTime,
        SpanColumn::Events,
        SpanColumn::Attributes,
        SpanColumn::LatencyMs,
        SpanColumn::CumulativeErrorCount,
        SpanColumn::CumulativeLlmTokenCountPrompt,
        SpanColumn::CumulativeLlmTokenCountCompletion,
        SpanColumn::CumulativeLlmTokenCountTotal,
        SpanColumn::LlmTokenCountPrompt,
        SpanColumn::LlmTokenCountCompletion,
        SpanColumn::LlmTokenCountTotal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpanColumn::SpanId => "span_id",
            SpanColumn::TraceId => "trace_id",
            SpanColumn::ParentId => "parent_id",
            SpanColumn::SpanKind => "span_kind",
            SpanColumn::Name => "name",
            SpanColumn::StatusCode => "status_code",
            SpanColumn::StatusMessage => "status_message",
            SpanColumn::StartTime => "start_time",
            SpanColumn::EndTime => "end_time",
            SpanColumn::Events => "events",
            SpanColumn::Attributes => "attributes",
            SpanColumn::LatencyMs => "latency_ms",
            SpanColumn::CumulativeErrorCount => "cumulative_error_count",
            SpanColumn::CumulativeLlmTokenCountPrompt => "cumulative_llm_token_count_prompt",
            SpanColumn::CumulativeLlmTokenCountCompletion => {
                "cumulative_llm_token_count_completion"
            }
            SpanColumn::CumulativeLlmTokenCountTotal => "cumulative_llm_token_count_total",
            SpanColumn::LlmTokenCountPrompt => "llm_token_count_prompt",
            SpanColumn::LlmTokenCountCompletion => "llm_token_count_completion",
            SpanColumn::LlmTokenCountTotal => "llm_token_count_total",
        }
    }

    pub fn from_name(name: &str) -> Option<SpanColumn> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }

    /// Resolve a bare or dotted name, including legacy aliases.
    pub fn resolve(name: &str) -> Option<SpanColumn> {
        let canonical = match name {
            "context.span_id" => "span_id",
            "context.trace_id" => "trace_id",
            "cumulative_token_count.prompt" => "cumulative_llm_token_count_prompt",
            "cumulative_token_count.completion" => "cumulative_llm_token_count_completion",
            "cumulative_token_count.total" => "cumulative_llm_token_count_total",
            other => other,
        };
        Self::from_name(canonical)
    }

    pub fn expr_type(self) -> ExprType {
        match self {
            SpanColumn::SpanId
            | SpanColumn::TraceId
            | SpanColumn::ParentId
            | SpanColumn::SpanKind
            | SpanColumn::Name
            | SpanColumn::StatusCode
            | SpanColumn::StatusMessage => ExprType::Str,
            SpanColumn::StartTime | SpanColumn::EndTime => ExprType::Timestamp,
            SpanColumn::Events | SpanColumn::Attributes => ExprType::Document,
            SpanColumn::LatencyMs => ExprType::Float,
            SpanColumn::CumulativeErrorCount
            | SpanColumn::CumulativeLlmTokenCountPrompt
            | SpanColumn::CumulativeLlmTokenCountCompletion
            | SpanColumn::CumulativeLlmTokenCountTotal
            | SpanColumn::LlmTokenCountPrompt
            | SpanColumn::LlmTokenCountCompletion
            | SpanColumn::LlmTokenCountTotal => ExprType::Int,
        }
    }

    /// Physical column on `spans`, if the column is stored rather than derived.
    pub fn stored(self) -> Option<&'static str> {
        match self {
            SpanColumn::SpanId => Some("spans.span_id"),
            SpanColumn::TraceId => Some("traces.trace_id"),
            SpanColumn::ParentId => Some("spans.parent_id"),
            SpanColumn::SpanKind => Some("spans.span_kind"),
            SpanColumn::Name => Some("spans.name"),
            SpanColumn::StatusCode => Some("spans.status_code"),
            SpanColumn::StatusMessage => Some("spans.status_message"),
            SpanColumn::StartTime => Some("spans.start_time"),
            SpanColumn::EndTime => Some("spans.end_time"),
            SpanColumn::Events => Some("spans.events"),
            SpanColumn::Attributes => Some(ATTRIBUTES_COLUMN),
            SpanColumn::CumulativeErrorCount => Some("spans.cumulative_error_count"),
            SpanColumn::CumulativeLlmTokenCountPrompt => {
                Some("spans.cumulative_llm_token_count_prompt")
            }
            SpanColumn::CumulativeLlmTokenCountCompletion => {
                Some("spans.cumulative_llm_token_count_completion")
            }
            SpanColumn::LlmTokenCountPrompt => Some("spans.llm_token_count_prompt"),
            SpanColumn::LlmTokenCountCompletion => Some("spans.llm_token_count_completion"),
            SpanColumn::LatencyMs
            | SpanColumn::CumulativeLlmTokenCountTotal
            | SpanColumn::LlmTokenCountTotal => None,
        }
    }
}

/// JSON column holding span attributes.
pub const ATTRIBUTES_COLUMN: &str = "spans.attributes";

/// Attribute subtree addressed by `metadata[...]`.
pub const METADATA_KEY: &str = "metadata";

/// Fields of an evaluation result usable as `evals["name"].<field>`.
pub const EVAL_ATTRIBUTES: &[&str] = &["label", "score", "explanation"];

pub fn eval_attribute_type(attribute: &str) -> ExprType {
    match attribute {
        "score" => ExprType::Float,
        _ => ExprType::Str,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_legacy_aliases() {
        assert_eq!(SpanColumn::resolve("context.span_id"), Some(SpanColumn::SpanId));
        assert_eq!(
            SpanColumn::resolve("cumulative_token_count.completion"),
            Some(SpanColumn::CumulativeLlmTokenCountCompletion)
        );
        assert_eq!(SpanColumn::resolve("latency_ms"), Some(SpanColumn::LatencyMs));
        assert_eq!(SpanColumn::resolve("llm.token_count.prompt"), None);
    }

    #[test]
    fn test_names_round_trip() {
        for column in SpanColumn::ALL {
            assert_eq!(SpanColumn::from_name(column.name()), Some(column));
        }
    }
}
