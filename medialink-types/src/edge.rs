//! Connection edges and their storable form.
//!
//! A [`ConnectionEdge`] is what a rule emits. A [`CacheItem`] is what the
//! store persists: the same edge plus its composite key, timestamps and the
//! evidence serialized as an opaque JSON string.

use crate::ResourceId;
use serde::{Deserialize, Serialize};

/// Region tag written on every connection item. Connections are not
/// region-scoped even when their endpoints are.
pub const GLOBAL_REGION: &str = "global";

/// A directed, evidenced relationship between two resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEdge {
    /// Upstream resource.
    pub source: ResourceId,
    /// Downstream resource.
    pub target: ResourceId,
    /// Tag of the rule that produced the edge.
    pub relation: String,
    /// Pipeline index for edges from pipelined resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<u32>,
    /// Why the match fired. Always carries `from` and `to`.
    pub evidence: serde_json::Value,
}

impl ConnectionEdge {
    /// Creates an edge with evidence seeded with `from` and `to`.
    pub fn new(
        source: impl Into<ResourceId>,
        target: impl Into<ResourceId>,
        relation: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let evidence = serde_json::json!({
            "from": source.as_str(),
            "to": target.as_str(),
        });
        Self {
            source,
            target,
            relation: relation.into(),
            pipeline: None,
            evidence,
        }
    }

    /// Marks the edge as belonging to one pipeline of a pipelined source.
    /// The index is also recorded in the evidence.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: u32) -> Self {
        self.pipeline = Some(pipeline);
        self.with_evidence("pipeline", pipeline)
    }

    /// Adds one evidence field.
    #[must_use]
    pub fn with_evidence(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Some(map) = self.evidence.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Returns one evidence field as a string, if present.
    pub fn evidence_str(&self, key: &str) -> Option<&str> {
        self.evidence.get(key).and_then(|v| v.as_str())
    }

    /// Composite storage key for this edge.
    #[must_use]
    pub fn identity_key(&self) -> String {
        Self::key_for(&self.source, &self.target, self.pipeline)
    }

    /// Composite storage key: `source:target` or `source:target:pipeline`.
    #[must_use]
    pub fn key_for(source: &ResourceId, target: &ResourceId, pipeline: Option<u32>) -> String {
        match pipeline {
            Some(p) => format!("{source}:{target}:{p}"),
            None => format!("{source}:{target}"),
        }
    }
}

/// The persisted form of a connection edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    /// Composite identity key, the store's primary key.
    pub key: String,
    pub from: ResourceId,
    pub to: ResourceId,
    pub region: String,
    /// Relation tag of the producing rule.
    pub relation: String,
    /// Unix seconds when this item was (re)derived.
    pub updated: i64,
    /// Unix seconds after which the store may evict this item.
    pub expires: i64,
    /// Evidence, serialized as a JSON document.
    pub data: String,
}

impl CacheItem {
    /// Parses the stored evidence back into a JSON value.
    pub fn evidence(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.data)?)
    }

    /// Returns whether this item has expired at `now` (Unix seconds).
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires <= now
    }
}
