//! Configuration management for feedctl

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use changefeed_storage::FeedConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the change feed (overridden by --root)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Events per page when --page-size isn't given
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Feed layout
    #[serde(default)]
    pub feed: FeedConfig,
}

fn default_page_size() -> usize {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            page_size: default_page_size(),
            feed: FeedConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `path`, or from the default location; missing files give defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path(),
        };

        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("invalid config {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get config file path (~/.changefeed/config.toml)
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".changefeed").join("config.toml")
    }
}
