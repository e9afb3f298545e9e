use crate::{ResourceId, ServiceCategory};
use serde::{Deserialize, Serialize};

/// A cached, point-in-time description of one resource.
///
/// The body is whatever the collector stored. The engine reads it and never
/// writes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub identity: ResourceId,
    pub category: ServiceCategory,
    pub body: serde_json::Value,
}

impl ResourceSnapshot {
    /// Creates a snapshot.
    pub fn new(
        identity: impl Into<ResourceId>,
        category: ServiceCategory,
        body: serde_json::Value,
    ) -> Self {
        Self {
            identity: identity.into(),
            category,
            body,
        }
    }
}
