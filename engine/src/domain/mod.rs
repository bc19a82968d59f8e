//! Domain logic
//!
//! - `traces` - Span attribute codec and the span query language
//! - `model_schema` - Declarative schemas over tabular model data

pub mod model_schema;
pub mod traces;
