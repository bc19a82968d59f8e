//! Trace data access
//!
//! - `attributes` - Flatten/unflatten codec for nested span attributes
//! - `dsl` - Filter and projection expressions, span queries

pub mod attributes;
pub mod dsl;

pub use dsl::{DslError, Projector, QueryError, QueryParams, SpanFilter, SpanFrame, SpanQuery};
