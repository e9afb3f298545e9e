use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a connection item, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 900;

/// Default minimum similarity ratio for fuzzy URL matching.
pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 80;

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lifetime of every materialized connection item.
    pub ttl_secs: i64,
    /// Minimum ratio (0-100) for a fuzzy match to fire.
    pub similarity_threshold: u8,
    /// Bound on each call to the snapshot reader and the sink (ms).
    pub store_timeout_ms: u64,
    /// Maximum number of rules evaluated at the same time.
    pub max_concurrent_rules: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            store_timeout_ms: 10_000,
            max_concurrent_rules: 4,
        }
    }
}

impl EngineConfig {
    /// Checks that every field is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs <= 0 {
            return Err(ConfigError::NonPositiveTtl(self.ttl_secs));
        }
        if self.similarity_threshold > 100 {
            return Err(ConfigError::ThresholdOutOfRange(self.similarity_threshold));
        }
        if self.max_concurrent_rules == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Store call timeout as a `Duration`.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
