//! Runs every rule once and hands the merged edges to the sink.
//!
//! A run has three phases:
//!
//! 1. **Load**: each category any rule reads is listed once, with a timeout,
//!    and decoded into a shared [`Inventory`]. A failed category is logged
//!    and left out; rules that read it fail on their own.
//! 2. **Evaluate**: rules run as blocking tasks, at most
//!    `max_concurrent_rules` at a time. Cancellation stops new launches;
//!    rules already running finish and keep their edges.
//! 3. **Write**: edges are merged by identity key (later rules win) and
//!    written in one batch, again with a timeout.
//!
//! Nothing in a run is returned as an error. Every failure ends up in the
//! [`RunReport`].

use crate::config::EngineConfig;
use crate::error::{ConfigError, RuleError};
use crate::materialize::to_cache_items;
use crate::rules::{default_rules, ConnectionRule};
use crate::views::Inventory;
use chrono::{DateTime, Utc};
use medialink_cache::{CacheError, EdgeSink, FailedItem, SnapshotReader};
use medialink_types::{ConnectionEdge, RunId, ServiceCategory};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Cooperative cancellation for a run.
///
/// Clones share state; cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to one rule in a run.
#[derive(Debug)]
pub enum RuleOutcome {
    /// The rule ran and emitted this many edges.
    Completed { edges: usize },
    /// The rule contributed nothing this run.
    Failed(RuleError),
    /// The run was cancelled before the rule started.
    Skipped,
}

#[derive(Debug)]
pub struct RuleReport {
    pub name: &'static str,
    pub relation: &'static str,
    pub outcome: RuleOutcome,
}

/// Summary of one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Per-rule outcomes, in registration order.
    pub rules: Vec<RuleReport>,
    /// Categories that could not be loaded.
    pub category_failures: Vec<(ServiceCategory, CacheError)>,
    /// Merged edges handed to the sink, one per identity key.
    pub edges: Vec<ConnectionEdge>,
    /// Items the sink wrote.
    pub written: usize,
    /// Items the sink rejected.
    pub failed: Vec<FailedItem>,
    /// Set when the batch write failed as a whole.
    pub sink_error: Option<CacheError>,
    /// Whether cancellation or the deadline cut the run short.
    pub cancelled: bool,
}

impl RunReport {
    /// Identity keys of the merged edges, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.edges.iter().map(ConnectionEdge::identity_key).collect();
        keys.sort_unstable();
        keys
    }

    pub fn rule(&self, name: &str) -> Option<&RuleReport> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Number of rules that failed.
    pub fn failed_rules(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Failed(_)))
            .count()
    }

    /// True if every rule completed and every edge was written.
    pub fn is_clean(&self) -> bool {
        self.rules
            .iter()
            .all(|r| matches!(r.outcome, RuleOutcome::Completed { .. }))
            && self.category_failures.is_empty()
            && self.failed.is_empty()
            && self.sink_error.is_none()
    }
}

/// Drives the rules against one snapshot reader and one sink.
pub struct Orchestrator {
    reader: Arc<dyn SnapshotReader>,
    sink: Arc<dyn EdgeSink>,
    rules: Vec<Arc<dyn ConnectionRule>>,
    config: Arc<EngineConfig>,
}

impl Orchestrator {
    /// Creates an orchestrator running [`default_rules`].
    pub fn new(
        reader: Arc<dyn SnapshotReader>,
        sink: Arc<dyn EdgeSink>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            reader,
            sink,
            rules: default_rules(),
            config: Arc::new(config),
        })
    }

    /// Replaces the rule set. Registration order decides key collisions.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Arc<dyn ConnectionRule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Arc<dyn ConnectionRule>] {
        &self.rules
    }

    /// Runs to completion.
    pub async fn run(&self) -> RunReport {
        self.run_until(&CancelToken::new(), None).await
    }

    /// Runs until done, cancelled, or past `deadline`.
    pub async fn run_until(&self, cancel: &CancelToken, deadline: Option<Instant>) -> RunReport {
        let run_id = RunId::new();
        let span = info_span!("connection_run", %run_id);
        self.execute(run_id, cancel, deadline).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: RunId,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> RunReport {
        let started_at = Utc::now();
        info!(rules = self.rules.len(), "connection run started");

        let (inventory, category_failures) = self.load_inventory().await;
        let (rules, mut per_rule, cancelled) =
            self.evaluate(Arc::new(inventory), cancel, deadline).await;

        let mut report = RunReport {
            run_id,
            started_at,
            rules,
            category_failures,
            edges: Vec::new(),
            written: 0,
            failed: Vec::new(),
            sink_error: None,
            cancelled,
        };

        // Registration order, then emission order.
        let mut edges = Vec::new();
        for slot in per_rule.iter_mut() {
            edges.append(slot);
        }
        report.edges = merge_edges(edges);
        self.write(&mut report).await;

        info!(
            edges = report.edges.len(),
            written = report.written,
            failed_items = report.failed.len(),
            failed_rules = report.failed_rules(),
            cancelled = report.cancelled,
            "connection run finished"
        );
        report
    }

    // ── Load ─────────────────────────────────────────────────────────

    async fn load_inventory(&self) -> (Inventory, Vec<(ServiceCategory, CacheError)>) {
        let needed: BTreeSet<ServiceCategory> = self
            .rules
            .iter()
            .flat_map(|rule| rule.inputs().iter().copied())
            .collect();

        let limit = self.config.store_timeout();
        let limit_ms = self.config.store_timeout_ms;
        let mut loads = JoinSet::new();
        for category in needed {
            let reader = Arc::clone(&self.reader);
            loads.spawn(
                async move {
                    let result = match timeout(limit, reader.list_by_category(category)).await {
                        Ok(result) => result,
                        Err(_) => Err(CacheError::Timeout(limit_ms)),
                    };
                    (category, result)
                }
                .in_current_span(),
            );
        }

        let mut inventory = Inventory::new();
        let mut failures = Vec::new();
        while let Some(joined) = loads.join_next().await {
            match joined {
                Ok((category, Ok(snapshots))) => {
                    debug!(%category, count = snapshots.len(), "category loaded");
                    inventory.load(category, &snapshots);
                }
                Ok((category, Err(e))) => {
                    warn!(%category, "category unavailable this run: {e}");
                    failures.push((category, e));
                }
                Err(e) => warn!("category load task failed: {e}"),
            }
        }
        failures.sort_by_key(|(category, _)| *category);
        (inventory, failures)
    }

    // ── Evaluate ─────────────────────────────────────────────────────

    async fn evaluate(
        &self,
        inventory: Arc<Inventory>,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> (Vec<RuleReport>, Vec<Vec<ConnectionEdge>>, bool) {
        let mut outcomes: Vec<RuleOutcome> =
            self.rules.iter().map(|_| RuleOutcome::Skipped).collect();
        let mut per_rule: Vec<Vec<ConnectionEdge>> = self.rules.iter().map(|_| Vec::new()).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_rules));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();
        let mut cancelled = false;

        for (index, rule) in self.rules.iter().enumerate() {
            let expired = deadline.is_some_and(|at| Instant::now() >= at);
            let permit = if cancel.is_cancelled() || expired {
                None
            } else {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    () = sleep_until(deadline) => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                }
            };
            let Some(permit) = permit else {
                cancelled = true;
                info!(skipped = self.rules.len() - index, "run cancelled, not launching remaining rules");
                break;
            };

            let rule = Arc::clone(rule);
            let inventory = Arc::clone(&inventory);
            let config = Arc::clone(&self.config);
            let span = Span::current();
            let handle = tasks.spawn_blocking(move || {
                let _entered = span.enter();
                let _permit = permit;
                rule.evaluate(&inventory, &config)
            });
            task_index.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (e.id(), Err(RuleError::Task(e.to_string()))),
            };
            let Some(&index) = task_index.get(&id) else {
                continue;
            };
            let rule = &self.rules[index];
            outcomes[index] = match result {
                Ok(edges) => {
                    info!(rule = rule.name(), edges = edges.len(), "rule completed");
                    for edge in &edges {
                        debug!(rule = rule.name(), key = %edge.identity_key(), "edge");
                    }
                    let count = edges.len();
                    per_rule[index] = edges;
                    RuleOutcome::Completed { edges: count }
                }
                Err(e) => {
                    warn!(rule = rule.name(), "rule failed: {e}");
                    RuleOutcome::Failed(e)
                }
            };
        }

        let reports = self
            .rules
            .iter()
            .zip(outcomes)
            .map(|(rule, outcome)| RuleReport {
                name: rule.name(),
                relation: rule.relation(),
                outcome,
            })
            .collect();
        (reports, per_rule, cancelled)
    }

    // ── Write ────────────────────────────────────────────────────────

    async fn write(&self, report: &mut RunReport) {
        let items = to_cache_items(&report.edges, medialink_cache::unix_now(), self.config.ttl_secs);
        let limit = self.config.store_timeout();
        match timeout(limit, self.sink.upsert_batch(&items)).await {
            Ok(Ok(outcome)) => {
                for failure in &outcome.failed {
                    warn!(key = %failure.key, "connection not written: {}", failure.reason);
                }
                report.written = outcome.written;
                report.failed = outcome.failed;
            }
            Ok(Err(e)) => {
                warn!(items = items.len(), "connection batch rejected: {e}");
                report.sink_error = Some(e);
            }
            Err(_) => {
                warn!(items = items.len(), "connection batch timed out");
                report.sink_error = Some(CacheError::Timeout(self.config.store_timeout_ms));
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Keeps one edge per identity key. A later edge replaces an earlier one in
/// place, so the result keeps first-seen order.
pub fn merge_edges(edges: Vec<ConnectionEdge>) -> Vec<ConnectionEdge> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<ConnectionEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        let key = edge.identity_key();
        match positions.get(&key) {
            Some(&at) => {
                debug!(%key, kept = %edge.relation, "duplicate connection key, replacing earlier edge");
                merged[at] = edge;
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(edge);
            }
        }
    }
    merged
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
