//! Path and file helpers for config and query spec files

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Resolve a user-supplied path to an absolute one.
///
/// `~` and `~/...` expand to the home directory; relative paths are joined
/// onto the current directory without being canonicalized. An empty string
/// is the current directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => dirs::home_dir()
            .map(|home| home.join(&rest[1..]))
            .unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    };

    if expanded.is_relative() {
        cwd().join(expanded)
    } else {
        expanded
    }
}

/// Read and deserialize a JSON file; `what` names the file in error messages.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    tracing::debug!(path = %path.display(), what, "Reading JSON file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}: {}", what, path.display()))
}
