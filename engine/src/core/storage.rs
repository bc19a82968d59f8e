//! Platform-aware data directory management
//!
//! ## Platform Paths
//!
//! | Type | Windows | macOS | Linux |
//! |------|---------|-------|-------|
//! | Data | `%APPDATA%\Phoenix\` | `~/Library/Application Support/Phoenix/` | `$XDG_DATA_HOME/phoenix/` |
//!
//! `PHOENIX_DATA_DIR` overrides the platform directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::config::{AppConfig, DatabaseBackend};
use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR, SQLITE_DB_FILENAME};
use crate::utils::file::expand_path;

/// Data subdirectories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubdir {
    Sqlite,
}

impl DataSubdir {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataSubdir::Sqlite => "sqlite",
        }
    }
}

/// Application storage manager
#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
}

impl AppStorage {
    /// Initialize storage with platform-appropriate data directory
    ///
    /// Directories are only created when the embedded SQLite store lives in
    /// the data directory.
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let data_dir = Self::resolve_data_dir();

        let uses_data_dir = config.database.backend == DatabaseBackend::Sqlite
            && config.database.sqlite.path.is_none();
        if uses_data_dir {
            let sqlite_dir = data_dir.join(DataSubdir::Sqlite.as_str());
            tokio::fs::create_dir_all(&sqlite_dir).await.with_context(|| {
                format!("Failed to create data directory: {}", sqlite_dir.display())
            })?;
        }

        // canonicalize requires the path to exist
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);
        tracing::debug!(data_dir = %data_dir.display(), "Storage initialized");
        Ok(Self { data_dir })
    }

    /// Resolve data directory from env var or platform default
    pub fn resolve_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return expand_path(&dir);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            return proj_dirs.data_dir().to_path_buf();
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(APP_DOT_FOLDER)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to a file within a subdirectory
    pub fn subdir_path(&self, subdir: DataSubdir, filename: &str) -> PathBuf {
        self.data_dir.join(subdir.as_str()).join(filename)
    }

    /// SQLite database file: the configured path, else the data directory default
    pub fn sqlite_path(&self, configured: Option<&Path>) -> PathBuf {
        configured
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.subdir_path(DataSubdir::Sqlite, SQLITE_DB_FILENAME))
    }

    /// Create AppStorage for testing with a specific data directory
    #[cfg(test)]
    pub fn init_for_test(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_subdir_as_str() {
        assert_eq!(DataSubdir::Sqlite.as_str(), "sqlite");
    }

    #[test]
    fn test_sqlite_path_default_and_override() {
        let storage = AppStorage::init_for_test(PathBuf::from("/data/phoenix"));
        assert_eq!(
            storage.sqlite_path(None),
            PathBuf::from("/data/phoenix/sqlite/phoenix.db")
        );
        assert_eq!(
            storage.sqlite_path(Some(Path::new("/tmp/spans.db"))),
            PathBuf::from("/tmp/spans.db")
        );
        assert_eq!(storage.data_dir(), Path::new("/data/phoenix"));
    }

    #[test]
    fn test_resolve_data_dir_fallback() {
        // SAFETY: no other test reads or writes this variable
        unsafe { std::env::remove_var(ENV_DATA_DIR) };
        let path = AppStorage::resolve_data_dir();
        assert!(!path.as_os_str().is_empty());
    }
}
