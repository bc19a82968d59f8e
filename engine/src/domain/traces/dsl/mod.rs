//! Span query language
//!
//! Filter and projection expressions use a small Python-like syntax
//! (`span_kind == 'LLM' and evals['QA'].score > 0.5`). They are compiled in
//! stages:
//!
//! - `lexer` / `parser` - Source text to [`ast::Expr`]
//! - `validate` - Closed whitelist of node kinds, eval names and fields
//! - `translate` - Typed SQL expressions over span columns and attributes
//! - `filter` / `projector` - Compiled predicates and column projections
//! - `query` - [`SpanQuery`] assembly, explode/concat, execution
//! - `frame` - Tabular query results

pub mod ast;
pub mod columns;
pub mod error;
pub mod filter;
pub mod frame;
pub mod lexer;
pub mod parser;
pub mod projector;
pub mod query;
pub mod translate;
pub mod validate;

pub use error::{DslError, QueryError};
pub use filter::{FilterSpec, SpanFilter};
pub use frame::SpanFrame;
pub use projector::Projector;
pub use query::{ConcatenationSpec, ExplosionSpec, ProjectionSpec, QueryParams, QuerySpec, SpanQuery};
