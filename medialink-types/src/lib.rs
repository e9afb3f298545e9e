//! Core type definitions for medialink.
//!
//! This crate defines the plain data types shared by the cache adapter and the
//! connection engine:
//! - Resource and run identifiers
//! - Service categories (the cache's partitioning key)
//! - Resource snapshots (what the collector leaves in the cache)
//! - Connection edges and their storable cache-item form
//!
//! Matching logic lives in `medialink-connect`, storage in `medialink-cache`.

mod category;
mod edge;
mod ids;
mod snapshot;

pub use category::ServiceCategory;
pub use edge::{CacheItem, ConnectionEdge, GLOBAL_REGION};
pub use ids::{ResourceId, RunId};
pub use snapshot::ResourceSnapshot;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown service category: {0}")]
    UnknownCategory(String),

    #[error("invalid run id: {0}")]
    InvalidRunId(#[from] uuid::Error),
}
