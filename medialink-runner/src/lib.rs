//! Configuration and cache seeding for the medialink runner binary.

mod config;
mod import;

pub use config::{RunnerConfig, DEFAULT_DATABASE, DEFAULT_REGION, TTL_ENV};
pub use import::{import_snapshots, read_snapshots};
