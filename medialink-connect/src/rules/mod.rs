//! The connection rules.
//!
//! A rule reads one or more categories from the [`Inventory`] and returns the
//! edges it can prove. Rules never see each other's output and never fail on
//! missing fields: an element without the field it needs is skipped.

pub mod medialive;
pub mod packaging;
pub mod storage;
pub mod transport;

use crate::config::EngineConfig;
use crate::error::RuleResult;
use crate::views::Inventory;
use medialink_types::{ConnectionEdge, ServiceCategory};
use std::fmt;
use std::sync::Arc;

/// A single matching rule.
pub trait ConnectionRule: Send + Sync {
    /// Unique rule name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Relation tag written on every edge the rule emits.
    fn relation(&self) -> &'static str;

    /// Categories the rule reads.
    fn inputs(&self) -> &'static [ServiceCategory];

    /// Computes the rule's edges for one run.
    fn evaluate(&self, inventory: &Inventory, config: &EngineConfig)
        -> RuleResult<Vec<ConnectionEdge>>;
}

/// Evaluation function of a [`Rule`].
pub type RuleFn = fn(&Inventory, &EngineConfig) -> RuleResult<Vec<ConnectionEdge>>;

/// A rule backed by a plain function.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub relation: &'static str,
    pub inputs: &'static [ServiceCategory],
    pub eval: RuleFn,
}

impl ConnectionRule for Rule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn relation(&self) -> &'static str {
        self.relation
    }

    fn inputs(&self) -> &'static [ServiceCategory] {
        self.inputs
    }

    fn evaluate(
        &self,
        inventory: &Inventory,
        config: &EngineConfig,
    ) -> RuleResult<Vec<ConnectionEdge>> {
        (self.eval)(inventory, config)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("relation", &self.relation)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// Every rule, in registration order.
///
/// The two endpoint-to-distribution rules share a relation and can emit the
/// same key; the URL rule is registered after the tag rule so its edge is the
/// one kept.
pub fn default_rules() -> Vec<Arc<dyn ConnectionRule>> {
    [
        medialive::CHANNEL_TO_PACKAGING_CHANNEL,
        storage::CHANNEL_TO_CONTAINER,
        storage::CONTAINER_TO_INPUT,
        medialive::INPUT_TO_CHANNEL,
        packaging::CHANNEL_TO_ENDPOINT,
        storage::BUCKET_TO_DISTRIBUTION,
        storage::BUCKET_TO_INPUT,
        storage::DISTRIBUTION_TO_INPUT,
        packaging::ENDPOINT_TO_DISTRIBUTION_BY_TAG,
        packaging::ENDPOINT_TO_DISTRIBUTION_BY_URL,
        packaging::ENDPOINT_TO_KEY_SERVER,
        transport::FLOW_TO_INPUT,
        transport::FLOW_TO_FLOW,
        packaging::ENDPOINT_TO_PLAYBACK_CONFIG,
        storage::BUCKET_TO_PLAYBACK_CONFIG,
        storage::CONTAINER_TO_PLAYBACK_CONFIG,
        medialive::CHANNEL_TO_MULTIPLEX,
        transport::MULTIPLEX_TO_FLOW,
        storage::CONTAINER_TO_DISTRIBUTION,
        storage::CHANNEL_TO_BUCKET,
        medialive::LINK_DEVICE_TO_INPUT,
        medialive::CHANNEL_TO_INPUT,
        transport::CHANNEL_TO_FLOW,
    ]
    .into_iter()
    .map(|rule| Arc::new(rule) as Arc<dyn ConnectionRule>)
    .collect()
}

/// Equality of two optional identifiers. Absent never matches.
pub(crate) fn same(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}
