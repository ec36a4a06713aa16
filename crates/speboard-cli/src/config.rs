//! `speboard.toml` configuration
//!
//! Every field has a default, so an absent or partial file is valid.
//! Resolution order: `--config` flag (or `SPEBOARD_CONFIG`), then
//! `./speboard.toml` when present, else built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use speboard_engine::EngineOptions;

/// File probed in the working directory when no config is given
pub const DEFAULT_CONFIG_FILE: &str = "speboard.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub annotations: AnnotationsConfig,
    pub import: EngineOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationsConfig {
    /// JSON file backing the annotation repository
    pub path: PathBuf,
    /// Author recorded on entries created from the command line
    pub author: String,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("speboard-annotations.json"),
            author: "Analista".into(),
        }
    }
}

impl Config {
    /// Load the configuration following the resolution order
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::from_file(local)
                } else {
                    tracing::debug!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a config file; a relative annotations path is taken relative to
    /// the file's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))?;

        if config.annotations.path.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.annotations.path = dir.join(&config.annotations.path);
            }
        }
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.import.default_track_sla_days, 15);
        assert_eq!(config.annotations.author, "Analista");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [annotations]
            author = "Ana"

            [import]
            default_task_sla_days = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.annotations.author, "Ana");
        assert_eq!(config.annotations.path, PathBuf::from("speboard-annotations.json"));
        assert_eq!(config.import.default_task_sla_days, 7);
        assert_eq!(config.import.default_track_sla_days, 15);
    }

    #[test]
    fn annotations_path_is_relative_to_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speboard.toml");
        std::fs::write(&path, "[annotations]\npath = \"notes.json\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.annotations.path, dir.path().join("notes.json"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speboard.toml");
        std::fs::write(&path, "[import]\ndefault_task_sla_days = \"ten\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
