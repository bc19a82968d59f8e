//! PostgreSQL SQL dialect implementation

use super::dialect::{ArrayUnnest, CastType, JsonCast};
use super::params::{PathKey, SqlValue};
use super::SqlDialect;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn value_placeholder(&self, index: usize, value: &SqlValue) -> String {
        let sql_type = match value {
            SqlValue::Null => return self.placeholder(index),
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Int(_) => "BIGINT",
            SqlValue::Float(_) => "DOUBLE PRECISION",
            SqlValue::Text(_) => "TEXT",
            SqlValue::TextArray(_) => "TEXT[]",
        };
        format!("${}::{}", index, sql_type)
    }

    fn json_path(&self, path: &[PathKey]) -> SqlValue {
        SqlValue::TextArray(path.iter().map(ToString::to_string).collect())
    }

    fn json_extract(&self, column: &str, path: &str, cast: JsonCast) -> String {
        let text = format!("({column} #>> {path})");
        match cast {
            JsonCast::Value | JsonCast::Json => format!("({column} #> {path})"),
            JsonCast::Text => text,
            JsonCast::Float => self.cast(&text, CastType::Float),
            JsonCast::Integer => self.cast(&text, CastType::Integer),
            JsonCast::Boolean => self.cast(&text, CastType::Boolean),
        }
    }

    fn duration_ms(&self, start: &str, end: &str) -> String {
        format!("(({} - {})::DOUBLE PRECISION / 1000.0)", end, start)
    }

    fn cast(&self, expr: &str, to: CastType) -> String {
        match to {
            CastType::Text => format!("({})::TEXT", expr),
            CastType::Float => format!("({})::DOUBLE PRECISION", expr),
            CastType::Integer => format!("TRUNC(({})::DOUBLE PRECISION)::BIGINT", expr),
            CastType::Boolean => format!("({})::BOOLEAN", expr),
        }
    }

    fn text_contains(&self, haystack: &str, needle: &str) -> String {
        format!("(strpos({}, {}) > 0)", haystack, needle)
    }

    fn json_output(&self, expr: &str) -> String {
        format!("to_jsonb({})::TEXT", expr)
    }

    fn json_document_output(&self, expr: &str) -> String {
        format!("({})::TEXT", expr)
    }

    fn extract_array_as_json(&self, column: &str, path: &str) -> String {
        format!(
            "(CASE WHEN jsonb_typeof({column} #> {path}) = 'array' THEN {column} #> {path} END)"
        )
    }

    fn supports_ordered_unnest(&self) -> bool {
        true
    }

    fn build_array_unnest(&self, array: &str, alias: &str) -> ArrayUnnest {
        ArrayUnnest {
            join: format!(
                "CROSS JOIN LATERAL jsonb_array_elements({array}) WITH ORDINALITY AS {alias}(obj, position)"
            ),
            element: format!("{alias}.obj"),
            // ordinality is 1-based
            position: format!("({alias}.position - 1)"),
        }
    }

    fn build_ordered_concat(&self, value: &str, separator: &str, order: &str) -> String {
        format!("string_agg({value}, {separator} ORDER BY {order})")
    }

    fn is_json_object(&self, element: &str) -> String {
        format!("(jsonb_typeof({element}) = 'object')")
    }

    fn element_text(&self, element: &str) -> String {
        format!(
            "(CASE jsonb_typeof({element}) WHEN 'string' THEN {element} #>> '{{}}' WHEN 'null' THEN NULL ELSE ({element})::TEXT END)"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let dialect = PostgresDialect;
        assert_eq!(dialect.placeholder(1), "$1");
        assert_eq!(dialect.placeholder(5), "$5");
    }

    #[test]
    fn test_value_placeholder_is_typed() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.value_placeholder(2, &SqlValue::TextArray(vec![])),
            "$2::TEXT[]"
        );
        assert_eq!(dialect.value_placeholder(1, &SqlValue::Float(1.0)), "$1::DOUBLE PRECISION");
        assert_eq!(dialect.value_placeholder(1, &SqlValue::Null), "$1");
    }

    #[test]
    fn test_json_path() {
        let dialect = PostgresDialect;
        let path = [PathKey::key("docs"), PathKey::Index(0), PathKey::key("score")];
        assert_eq!(
            dialect.json_path(&path),
            SqlValue::TextArray(vec!["docs".into(), "0".into(), "score".into()])
        );
    }

    #[test]
    fn test_json_extract() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.json_extract("spans.attributes", "$1::TEXT[]", JsonCast::Text),
            "(spans.attributes #>> $1::TEXT[])"
        );
        assert_eq!(
            dialect.json_extract("spans.attributes", "$1::TEXT[]", JsonCast::Float),
            "((spans.attributes #>> $1::TEXT[]))::DOUBLE PRECISION"
        );
    }

    #[test]
    fn test_ordered_unnest_and_concat() {
        let dialect = PostgresDialect;
        assert!(dialect.supports_ordered_unnest());
        let unnest = dialect.build_array_unnest("base.arr", "elems");
        assert_eq!(
            unnest.join,
            "CROSS JOIN LATERAL jsonb_array_elements(base.arr) WITH ORDINALITY AS elems(obj, position)"
        );
        assert_eq!(unnest.position, "(elems.position - 1)");
        assert_eq!(
            dialect.build_ordered_concat("v", "$1::TEXT", &unnest.position),
            "string_agg(v, $1::TEXT ORDER BY (elems.position - 1))"
        );
    }

    #[test]
    fn test_element_text() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.element_text("e.obj"),
            "(CASE jsonb_typeof(e.obj) WHEN 'string' THEN e.obj #>> '{}' WHEN 'null' THEN NULL ELSE (e.obj)::TEXT END)"
        );
    }
}
