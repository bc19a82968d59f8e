//! SQL abstraction layer for multi-database support
//!
//! This module provides abstractions for generating SQL that works across
//! the SQLite and PostgreSQL span stores.

mod builder;
mod dialect;
mod params;
mod postgres_dialect;
mod sqlite_dialect;

pub use builder::{ArithmeticOp, CompareOp, Join, JoinKind, SelectStatement, SqlExpr};
pub use dialect::{ArrayUnnest, CastType, JsonCast, SqlDialect};
pub use params::{PathKey, SqlParams, SqlValue};
pub use postgres_dialect::PostgresDialect;
pub use sqlite_dialect::SqliteDialect;

/// Database backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    /// Get the SQL dialect for this backend
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Backend::Sqlite => &SqliteDialect,
            Backend::Postgres => &PostgresDialect,
        }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_dialects() {
        assert_eq!(Backend::Sqlite.dialect().name(), "sqlite");
        assert_eq!(Backend::Postgres.dialect().name(), "postgres");
        assert_eq!(Backend::Postgres.to_string(), "postgres");
    }
}
