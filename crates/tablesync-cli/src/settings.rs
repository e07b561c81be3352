//! Settings file and default locations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tablesync_migrate::SyncOptions;

/// Contents of `settings.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sync: SyncOptions,
}

impl Settings {
    /// Load settings from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        tracing::info!(path = %path.display(), "settings loaded");
        Ok(Self {
            sync: settings.sync.normalized(),
        })
    }
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("tablesync"))
}

pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .context("Could not determine data directory")
        .map(|p| p.join("tablesync"))
}

pub fn settings_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("settings.toml"))
}

pub fn connections_file() -> Result<PathBuf> {
    data_dir().map(|p| p.join("connections.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_sync_table_is_read_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[sync]\nmax_workers = 8\ninsert_batch_size = 0\ntable_timeout_ms = 0\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(
            settings.sync,
            SyncOptions::default()
                .with_max_workers(8)
                .with_insert_batch_size(1)
                .with_table_timeout_ms(0)
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[sync\nmax_workers = ").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn test_default_locations_are_namespaced() {
        if let Ok(path) = settings_file() {
            assert!(path.ends_with("tablesync/settings.toml"));
        }
        if let Ok(path) = connections_file() {
            assert!(path.ends_with("tablesync/connections.json"));
        }
    }
}
