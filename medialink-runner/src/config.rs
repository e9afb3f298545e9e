//! Runner configuration: a TOML file, then environment overrides.
//!
//! ```toml
//! database = "medialink.db"
//! region = "us-west-2"
//! interval_secs = 60
//!
//! [engine]
//! ttl_secs = 900
//! similarity_threshold = 80
//! ```

use anyhow::{Context, Result};
use medialink_connect::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "medialink.db";

/// Region recorded on imported snapshots when none is configured.
pub const DEFAULT_REGION: &str = "global";

/// Overrides `engine.ttl_secs`.
pub const TTL_ENV: &str = "MEDIALINK_CACHE_TTL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// SQLite cache file.
    pub database: PathBuf,
    /// Region tag for imported snapshots.
    pub region: String,
    /// Delay between scheduled runs. `None` runs once.
    pub interval_secs: Option<u64>,
    pub engine: EngineConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            region: DEFAULT_REGION.to_string(),
            interval_secs: None,
            engine: EngineConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse runner configuration")
    }

    /// Reads `path` if given, then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies environment overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(TTL_ENV) {
            self.engine.ttl_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{TTL_ENV} must be a whole number of seconds, got {raw:?}"))?;
        }
        Ok(())
    }

    /// Checks the engine section.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .context("Invalid [engine] configuration")
    }
}
