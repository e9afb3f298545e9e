//! Error types for the connection engine.

use medialink_cache::CacheError;
use medialink_types::ServiceCategory;
use thiserror::Error;

/// Result type for rule evaluation.
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors that make a rule contribute nothing for one run.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A category the rule reads could not be loaded this run.
    #[error("category {0} is unavailable this run")]
    MissingCategory(ServiceCategory),

    /// The cache failed while serving the rule.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The rule found data it cannot work with at all.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The rule's task panicked or was aborted.
    #[error("rule task failed: {0}")]
    Task(String),
}

/// Errors in engine configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ttl_secs must be positive, got {0}")]
    NonPositiveTtl(i64),

    #[error("similarity_threshold must be at most 100, got {0}")]
    ThresholdOutOfRange(u8),

    #[error("max_concurrent_rules must be at least 1")]
    NoConcurrency,

    #[error("store_timeout_ms must be positive")]
    ZeroTimeout,
}
