//! SQL dialect trait for multi-database support
//!
//! This trait defines the interface for generating database-specific SQL syntax.
//! The query assembler picks one implementation per execution from the backend
//! of the active connection.

use super::params::{PathKey, SqlValue};

/// How a JSON path lookup is typed in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCast {
    /// Native comparable value (SQLite scalar, PostgreSQL `jsonb`)
    Value,
    /// JSON document text of the subtree
    Json,
    Text,
    Float,
    Integer,
    Boolean,
}

/// Target type of an explicit cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Text,
    Float,
    Integer,
    Boolean,
}

/// FROM-clause fragment expanding a JSON array into one row per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayUnnest {
    /// Join clause, e.g. `CROSS JOIN LATERAL ...`
    pub join: String,
    /// Element value expression
    pub element: String,
    /// Zero-based element position expression
    pub position: String,
}

/// SQL dialect trait for generating database-specific SQL
///
/// Different databases have different syntax for:
/// - Parameter placeholders (? vs $1)
/// - JSON path extraction and typing
/// - Substring search
/// - Ordered array expansion and aggregation
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Generate a parameter placeholder for the given index (1-based)
    ///
    /// - SQLite: Always returns "?"
    /// - PostgreSQL: Returns "$1", "$2", etc.
    fn placeholder(&self, index: usize) -> String;

    /// Placeholder for a bound value; PostgreSQL annotates the type.
    fn value_placeholder(&self, index: usize, _value: &SqlValue) -> String {
        self.placeholder(index)
    }

    /// Encode a JSON path as a bindable value
    ///
    /// - SQLite: `$."a"[0]."b"`
    /// - PostgreSQL: `{a,0,b}` as `TEXT[]`
    fn json_path(&self, path: &[PathKey]) -> SqlValue;

    /// Extract a JSON path from a JSON column. `path` is a rendered placeholder.
    ///
    /// - SQLite: `json_extract(col, ?)`, `col -> ?` for documents
    /// - PostgreSQL: `col #> $1`, `col #>> $1` for text
    fn json_extract(&self, column: &str, path: &str, cast: JsonCast) -> String;

    /// Milliseconds between two microsecond timestamps, as a float
    ///
    /// - SQLite: `((end - start) / 1000.0)`
    /// - PostgreSQL: `((end - start)::DOUBLE PRECISION / 1000.0)`
    fn duration_ms(&self, start: &str, end: &str) -> String;

    /// Explicit cast
    ///
    /// - SQLite: `CAST(x AS REAL)`
    /// - PostgreSQL: `(x)::DOUBLE PRECISION`
    fn cast(&self, expr: &str, to: CastType) -> String;

    /// Case-sensitive literal substring test (no wildcard semantics)
    ///
    /// - SQLite: `instr(haystack, needle) > 0`
    /// - PostgreSQL: `strpos(haystack, needle) > 0`
    fn text_contains(&self, haystack: &str, needle: &str) -> String;

    /// String concatenation
    fn concat(&self, left: &str, right: &str) -> String {
        format!("({left} || {right})")
    }

    /// Encode a scalar expression as JSON text
    ///
    /// - SQLite: `json_quote(x)`
    /// - PostgreSQL: `to_jsonb(x)::TEXT`
    fn json_output(&self, expr: &str) -> String;

    /// Encode a JSON document expression as JSON text
    ///
    /// - SQLite: `json(x)`
    /// - PostgreSQL: `(x)::TEXT`
    fn json_document_output(&self, expr: &str) -> String;

    /// The JSON array at `path`, or NULL when the value is not an array
    fn extract_array_as_json(&self, column: &str, path: &str) -> String;

    /// Whether array expansion preserves element order with an explicit position
    fn supports_ordered_unnest(&self) -> bool;

    /// Expand a JSON array expression into rows
    ///
    /// - SQLite: `json_each(array)` (no ordering guarantee)
    /// - PostgreSQL: `jsonb_array_elements(array) WITH ORDINALITY`
    fn build_array_unnest(&self, array: &str, alias: &str) -> ArrayUnnest;

    /// Aggregate text values joined by `separator` in `order` order
    ///
    /// - SQLite: `group_concat(value, sep)` (order not guaranteed)
    /// - PostgreSQL: `string_agg(value, sep ORDER BY position)`
    fn build_ordered_concat(&self, value: &str, separator: &str, order: &str) -> String;

    /// Predicate that an unnested element is a JSON object
    fn is_json_object(&self, element: &str) -> String;

    /// Text of an unnested element: strings verbatim, other values as JSON
    fn element_text(&self, element: &str) -> String;

    /// Generate LIMIT clause
    fn limit(&self, limit: u64) -> String {
        format!("LIMIT {limit}")
    }
}
