//! SQLite SQL dialect implementation

use super::dialect::{ArrayUnnest, CastType, JsonCast};
use super::params::{PathKey, SqlValue};
use super::SqlDialect;

/// SQLite SQL dialect
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn json_path(&self, path: &[PathKey]) -> SqlValue {
        let mut encoded = String::from("$");
        for key in path {
            match key {
                // Quoted labels have no escape syntax; keys containing `"`
                // are rejected before they reach a path.
                PathKey::Key(key) => {
                    encoded.push_str(".\"");
                    encoded.push_str(key);
                    encoded.push('"');
                }
                PathKey::Index(index) if *index < 0 => {
                    encoded.push_str(&format!("[#{index}]"));
                }
                PathKey::Index(index) => encoded.push_str(&format!("[{index}]")),
            }
        }
        SqlValue::Text(encoded)
    }

    fn json_extract(&self, column: &str, path: &str, cast: JsonCast) -> String {
        // json_extract yields SQL scalars; `->` yields JSON text
        let value = format!("json_extract({column}, {path})");
        match cast {
            JsonCast::Value | JsonCast::Boolean => value,
            JsonCast::Json => format!("({column} -> {path})"),
            JsonCast::Text => self.cast(&value, CastType::Text),
            JsonCast::Float => self.cast(&value, CastType::Float),
            JsonCast::Integer => self.cast(&value, CastType::Integer),
        }
    }

    fn duration_ms(&self, start: &str, end: &str) -> String {
        // SQLite timestamps are stored as microseconds
        format!("(({} - {}) / 1000.0)", end, start)
    }

    fn cast(&self, expr: &str, to: CastType) -> String {
        let sql_type = match to {
            CastType::Text => "TEXT",
            CastType::Float => "REAL",
            // SQLite has no boolean type; true and false are 1 and 0
            CastType::Integer | CastType::Boolean => "INTEGER",
        };
        format!("CAST({} AS {})", expr, sql_type)
    }

    fn text_contains(&self, haystack: &str, needle: &str) -> String {
        format!("(instr({}, {}) > 0)", haystack, needle)
    }

    fn json_output(&self, expr: &str) -> String {
        format!("json_quote({})", expr)
    }

    fn json_document_output(&self, expr: &str) -> String {
        format!("json({})", expr)
    }

    fn extract_array_as_json(&self, column: &str, path: &str) -> String {
        // Non-arrays are skipped when the document is expanded in process
        format!("({column} -> {path})")
    }

    fn supports_ordered_unnest(&self) -> bool {
        false
    }

    fn build_array_unnest(&self, array: &str, alias: &str) -> ArrayUnnest {
        ArrayUnnest {
            join: format!("CROSS JOIN json_each({array}) AS {alias}"),
            element: format!("{alias}.value"),
            position: format!("{alias}.key"),
        }
    }

    fn build_ordered_concat(&self, value: &str, separator: &str, _order: &str) -> String {
        format!("group_concat({value}, {separator})")
    }

    fn is_json_object(&self, element: &str) -> String {
        // json_each yields strings as plain text, which json_type rejects
        format!("(CASE WHEN json_valid({element}) THEN json_type({element}) = 'object' ELSE 0 END)")
    }

    fn element_text(&self, element: &str) -> String {
        // json_each already yields strings unquoted and containers as JSON text
        element.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.placeholder(1), "?");
        assert_eq!(dialect.placeholder(5), "?");
    }

    #[test]
    fn test_json_path() {
        let dialect = SqliteDialect;
        let path = [
            PathKey::key("retrieval"),
            PathKey::key("documents"),
            PathKey::Index(0),
            PathKey::key("a.b"),
            PathKey::Index(-1),
        ];
        assert_eq!(
            dialect.json_path(&path),
            SqlValue::Text(r#"$."retrieval"."documents"[0]."a.b"[#-1]"#.to_string())
        );
    }

    #[test]
    fn test_json_extract() {
        let dialect = SqliteDialect;
        assert_eq!(
            dialect.json_extract("spans.attributes", "?", JsonCast::Value),
            "json_extract(spans.attributes, ?)"
        );
        assert_eq!(
            dialect.json_extract("spans.attributes", "?", JsonCast::Float),
            "CAST(json_extract(spans.attributes, ?) AS REAL)"
        );
        assert_eq!(
            dialect.json_extract("spans.attributes", "?", JsonCast::Json),
            "(spans.attributes -> ?)"
        );
    }

    #[test]
    fn test_duration_ms() {
        let dialect = SqliteDialect;
        assert_eq!(
            dialect.duration_ms("start_time", "end_time"),
            "((end_time - start_time) / 1000.0)"
        );
    }

    #[test]
    fn test_text_contains_has_no_wildcards() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.text_contains("h", "?"), "(instr(h, ?) > 0)");
    }

    #[test]
    fn test_unnest_is_unordered() {
        let dialect = SqliteDialect;
        assert!(!dialect.supports_ordered_unnest());
        let unnest = dialect.build_array_unnest("base.arr", "elems");
        assert_eq!(unnest.join, "CROSS JOIN json_each(base.arr) AS elems");
        assert_eq!(unnest.position, "elems.key");
    }
}
