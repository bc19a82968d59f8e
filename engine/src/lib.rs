//! Span query engine
//!
//! Compiles filter and projection expressions over span attributes into SQL
//! for SQLite and PostgreSQL span stores, and models tabular inference data
//! through declarative schemas.

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
