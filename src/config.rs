//! Run configuration.
//!
//! Every value has a default, so a run needs no file at all. A TOML file
//! may override any subset of keys and command-line flags override both.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("max_items must be at least 1")]
    ZeroMaxItems,
}

/// Metadata written into a freshly created `<channel>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "Editorial".to_string(),
            link: "https://www.bd-pratidin.com/editorial".to_string(),
            description: "Latest editorial articles".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Saved category page to read articles from.
    pub html_path: PathBuf,

    /// Feed file, read if present and rewritten on every run.
    pub xml_path: PathBuf,

    /// Items kept after a run; the oldest stored items go first.
    pub max_items: usize,

    pub channel: ChannelConfig,

    /// MIME type stamped on every image enclosure.
    pub enclosure_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            html_path: PathBuf::from("opinion.html"),
            xml_path: PathBuf::from("articles.xml"),
            max_items: 500,
            channel: ChannelConfig::default(),
            enclosure_type: "image/jpeg".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_items == 0 {
            return Err(ConfigError::ZeroMaxItems);
        }
        Ok(())
    }
}
