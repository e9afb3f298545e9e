//! Redundant-pipeline fan-out.

use medialink_types::ConnectionEdge;

/// Channel class that runs two redundant pipelines.
pub const STANDARD_CLASS: &str = "STANDARD";

/// Number of pipelines a resource runs.
///
/// A channel-class field decides it whenever the key is present (`STANDARD`
/// runs two, any other value or `null` one). Otherwise each declared output
/// destination is one pipeline.
pub fn running_pipelines(channel_class: Option<Option<&str>>, destination_count: usize) -> u32 {
    match channel_class {
        Some(Some(STANDARD_CLASS)) => 2,
        Some(_) => 1,
        None => u32::try_from(destination_count).unwrap_or(u32::MAX),
    }
}

/// Resources whose connections are emitted once per pipeline.
pub trait Pipelined {
    /// The channel-class field: `None` when absent, `Some(None)` when `null`.
    fn channel_class(&self) -> Option<Option<&str>>;
    fn destination_count(&self) -> usize;

    fn running_pipelines(&self) -> u32 {
        running_pipelines(self.channel_class(), self.destination_count())
    }
}

/// One copy of the edge built by `make` per pipeline index `0..count`.
pub fn fan_out(count: u32, make: impl Fn() -> ConnectionEdge) -> Vec<ConnectionEdge> {
    (0..count).map(|pipeline| make().with_pipeline(pipeline)).collect()
}
