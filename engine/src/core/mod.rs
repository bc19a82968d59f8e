//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands, QueryArgs};
pub use config::{AppConfig, DatabaseBackend, DatabaseConfig, QueryConfig};
pub use storage::{AppStorage, DataSubdir};
