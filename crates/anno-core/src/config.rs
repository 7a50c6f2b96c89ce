//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/anno/config.toml)
//! 3. Environment variables (ANNO_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::project::{sub_project_key, DIR_SEPARATOR};
use crate::store::StoreOptions;

/// Environment variable prefix
const ENV_PREFIX: &str = "ANNO";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Colon-separated list of sub-project directories
    #[serde(default)]
    pub project_dirs: String,

    /// Reject pages whose audio file is missing
    #[serde(default = "default_verify_audio")]
    pub verify_audio: bool,

    /// Log level for the anno crates (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dirs: String::new(),
            verify_audio: default_verify_audio(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ANNO_PROJECT_DIRS, ANNO_VERIFY_AUDIO, ANNO_LOG_LEVEL)
    /// 2. Config file (~/.config/anno/config.toml or ANNO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(cli_path: Option<&Path>) -> Result<Self> {
        match cli_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // ANNO_PROJECT_DIRS
        if let Ok(val) = std::env::var(format!("{}_PROJECT_DIRS", ENV_PREFIX)) {
            self.project_dirs = val;
        }

        // ANNO_VERIFY_AUDIO
        if let Ok(val) = std::env::var(format!("{}_VERIFY_AUDIO", ENV_PREFIX)) {
            self.verify_audio = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // ANNO_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Sub-project directories as registry keys, blanks dropped
    pub fn sub_projects(&self) -> Vec<String> {
        self.project_dirs
            .split(DIR_SEPARATOR)
            .filter_map(sub_project_key)
            .collect()
    }

    /// Store options derived from this configuration
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            verify_audio: self.verify_audio,
        }
    }

    /// Get the config file path
    ///
    /// Can be overridden with ANNO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anno")
            .join("config.toml")
    }
}

fn default_verify_audio() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
