//! Configuration parsing and validation.
//!
//! Configuration is loaded from a TOML file (default: `config/fidx.toml`).
//! Only `[db]` is required; `[scroll]` and `[search]` fall back to the
//! acquisition and search defaults.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/feed.sqlite"
//!
//! [scroll]
//! min_delay_ms = 1500
//! max_delay_ms = 3000
//! scroll_distance = 800
//!
//! [search]
//! default_limit = 50
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquisition::ScrollConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scroll: ScrollSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. Created on first use.
    pub path: PathBuf,
}

/// Timing of the acquisition loop.
#[derive(Debug, Deserialize, Clone)]
pub struct ScrollSettings {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_scroll_distance")]
    pub scroll_distance: i64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            scroll_distance: default_scroll_distance(),
        }
    }
}

impl ScrollSettings {
    pub fn to_scroll_config(&self) -> ScrollConfig {
        ScrollConfig {
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            scroll_distance: self.scroll_distance,
        }
    }
}

fn default_min_delay_ms() -> u64 {
    1500
}
fn default_max_delay_ms() -> u64 {
    3000
}
fn default_scroll_distance() -> i64 {
    800
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    feed_index_core::search::DEFAULT_LIMIT
}

impl Config {
    /// Configuration pointing at `db_path` with every other section defaulted.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            scroll: ScrollSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.scroll.min_delay_ms > config.scroll.max_delay_ms {
        anyhow::bail!(
            "scroll.min_delay_ms ({}) must be <= scroll.max_delay_ms ({})",
            config.scroll.min_delay_ms,
            config.scroll.max_delay_ms
        );
    }

    if config.scroll.scroll_distance <= 0 {
        anyhow::bail!("scroll.scroll_distance must be > 0");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"/tmp/feed.sqlite\"\n").unwrap();
        assert_eq!(config.scroll.min_delay_ms, 1500);
        assert_eq!(config.scroll.max_delay_ms, 3000);
        assert_eq!(config.scroll.scroll_distance, 800);
        assert_eq!(config.search.default_limit, 50);

        let scroll = config.scroll.to_scroll_config();
        assert_eq!(scroll.min_delay, Duration::from_millis(1500));
        assert_eq!(scroll.scroll_distance, 800);
    }

    #[test]
    fn rejects_inverted_delays() {
        let err = parse(
            "[db]\npath = \"x\"\n[scroll]\nmin_delay_ms = 5000\nmax_delay_ms = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_delay_ms"));
    }

    #[test]
    fn rejects_zero_limit_and_distance() {
        assert!(parse("[db]\npath = \"x\"\n[search]\ndefault_limit = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[scroll]\nscroll_distance = 0\n").is_err());
    }

    #[test]
    fn missing_db_section_is_an_error() {
        assert!(parse("[search]\ndefault_limit = 5\n").is_err());
    }
}
