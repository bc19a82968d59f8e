//! SQL utility functions

/// Quote an identifier (column alias, table alias) with double quotes.
///
/// Embedded double quotes are doubled, which both SQLite and PostgreSQL accept.
///
/// # Example
///
/// ```
/// use phoenix_engine::utils::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("context.span_id"), "\"context.span_id\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
