//! Connection inference engine for medialink.
//!
//! Given the cached descriptions of media resources (live channels, inputs,
//! packaging endpoints, storage, CDN distributions, transport flows), the
//! engine decides which resources feed which and writes those connections back
//! to the cache with an expiry.
//!
//! # Architecture
//!
//! - **Views**: each category's snapshot bodies decode once per run into typed
//!   views, collected in an [`Inventory`]
//! - **Extractors and matchers**: URL splitting, storage/CDN URL recognition,
//!   deep-field paths, fuzzy similarity, synthesized network keys
//! - **Rules**: independent functions from an inventory to edges
//! - **Orchestrator**: loads the inventory, runs the rules in parallel, merges
//!   their edges and writes one batch
//!
//! # Example
//!
//! ```no_run
//! use medialink_cache::SqliteCache;
//! use medialink_connect::{EngineConfig, Orchestrator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(SqliteCache::open("cache.db")?);
//! let engine = Orchestrator::new(cache.clone(), cache, EngineConfig::default())?;
//! let report = engine.run().await;
//! println!("{} connections", report.edges.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod extract;
pub mod materialize;
pub mod matchers;
pub mod orchestrator;
pub mod path;
pub mod pipeline;
pub mod rules;
pub mod views;

pub use config::{EngineConfig, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TTL_SECS};
pub use error::{ConfigError, RuleError, RuleResult};
pub use orchestrator::{CancelToken, Orchestrator, RuleOutcome, RuleReport, RunReport};
pub use path::FieldPath;
pub use rules::{default_rules, ConnectionRule, Rule};
pub use views::{Inventory, Resource, ResourceView};
