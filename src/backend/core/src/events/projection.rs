//! CQRS read model: folds migrated events into a queryable command graph.
//!
//! A `GraphProjection` is scoped to one aggregate. It starts from that
//! aggregate's snapshot (or empty state), pulls the events appended since,
//! runs each through the migrator, and folds them in append order. Given the
//! same event history the resulting graph is deterministic.
//!
//! The fold is permissive: an event referencing a node or parent that does
//! not exist yet is a counted, logged no-op — the read model never crashes
//! on a logically inconsistent stream.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::Result;

use super::event::{CommandPayload, Event};
use super::log::EventLog;
use super::schema::Migrator;

// =============================================================================
// Command Status FSM
// =============================================================================

/// Lifecycle state of a command node.
///
/// Transitions: `PENDING -> RUNNING -> {DONE, ERROR}`. `Pending` is the
/// initial state on creation; `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Running,
    Done,
    Error,
}

// =============================================================================
// Projection Node
// =============================================================================

/// A materialized command node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionNode {
    /// The command's aggregate id.
    pub id: String,

    /// The command type (e.g. "build").
    pub command_type: String,

    /// Command arguments, opaque to the projection.
    pub args: Value,

    /// Current lifecycle state.
    pub status: CommandStatus,

    /// Ids of linked child commands. Semantically a set: redelivered child
    /// links are folded at most once.
    pub children: Vec<String>,
}

// =============================================================================
// Graph Projection
// =============================================================================

/// Read model over one aggregate's event stream.
///
/// Pull-based: state advances only when [`GraphProjection::build_from_snapshot`]
/// replays the log. Writers never push into it.
pub struct GraphProjection {
    aggregate_id: String,
    log: Arc<EventLog>,
    migrator: Arc<Migrator>,
    graph: BTreeMap<String, ProjectionNode>,
    version: u32,
    orphaned_events: u64,
    migration_gaps: u64,
}

impl GraphProjection {
    /// Build a projection for an aggregate from its snapshot plus the events
    /// appended since.
    ///
    /// With no snapshot on disk this is a full replay from the first event.
    #[instrument(skip(log, migrator), fields(aggregate_id = %aggregate_id.as_ref()))]
    pub fn build_from_snapshot(
        aggregate_id: impl AsRef<str>,
        log: Arc<EventLog>,
        migrator: Arc<Migrator>,
    ) -> Result<Self> {
        let aggregate_id = aggregate_id.as_ref().to_string();

        let (graph, version) = match log.read_snapshot(&aggregate_id)? {
            Some(snapshot) => (snapshot.state, snapshot.version),
            None => (BTreeMap::new(), 0),
        };

        let mut projection = Self {
            aggregate_id: aggregate_id.clone(),
            log,
            migrator,
            graph,
            version,
            orphaned_events: 0,
            migration_gaps: 0,
        };

        // Child links live under the child's aggregate id; a plain
        // per-aggregate read would never deliver them to this parent.
        let events = projection
            .log
            .read_linked_since(&aggregate_id, projection.version)?;
        let mut migrated = Vec::with_capacity(events.len());
        for event in &events {
            let outcome = projection.migrator.migrate(event)?;
            if outcome.gap.is_some() {
                projection.migration_gaps += 1;
            }
            migrated.push(outcome.into_event());
        }
        projection.apply_events(&migrated);

        debug!(
            aggregate_id,
            snapshot_version = version,
            replayed = migrated.len(),
            migration_gaps = projection.migration_gaps,
            "Projection built"
        );
        Ok(projection)
    }

    /// The aggregate this projection is scoped to.
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// Version of the last event folded into the graph.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of events skipped because they referenced an unknown node or
    /// parent.
    pub fn orphaned_event_count(&self) -> u64 {
        self.orphaned_events
    }

    /// Number of replayed events whose migration chain stopped short of the
    /// latest registered schema version.
    pub fn migration_gap_count(&self) -> u64 {
        self.migration_gaps
    }

    /// A read-only copy of the materialized graph.
    pub fn get_graph(&self) -> BTreeMap<String, ProjectionNode> {
        self.graph.clone()
    }

    /// Borrow a single node by id.
    pub fn node(&self, id: &str) -> Option<&ProjectionNode> {
        self.graph.get(id)
    }

    /// Fold a batch of (already migrated) events into the graph in order.
    pub fn apply_events(&mut self, events: &[Event]) {
        for event in events {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: &Event) {
        // Untagged payload decoding can coerce a foreign record into a known
        // shape; fold only when the type string agrees with the payload.
        let command = event
            .payload
            .as_command()
            .filter(|payload| event.kind() == Some(payload.kind()));

        match command {
            Some(CommandPayload::CommandCreated { command_type, args }) => {
                // Insert-or-replace: redelivered creation resets the node.
                self.graph.insert(
                    event.aggregate_id.clone(),
                    ProjectionNode {
                        id: event.aggregate_id.clone(),
                        command_type: command_type.clone(),
                        args: args.clone(),
                        status: CommandStatus::Pending,
                        children: Vec::new(),
                    },
                );
            }
            Some(CommandPayload::CommandStarted) => {
                self.set_status(event, CommandStatus::Running);
            }
            Some(CommandPayload::CommandCompleted) => {
                self.set_status(event, CommandStatus::Done);
            }
            Some(CommandPayload::CommandFailed { .. }) => {
                self.set_status(event, CommandStatus::Error);
            }
            Some(CommandPayload::ChildCommandCreated { parent_id, .. }) => {
                match self.graph.get_mut(parent_id) {
                    Some(parent) => {
                        // Child links are a set; tolerate redelivery.
                        if !parent.children.contains(&event.aggregate_id) {
                            parent.children.push(event.aggregate_id.clone());
                        }
                    }
                    None => {
                        let missing = parent_id.clone();
                        self.count_orphan(event, &missing);
                    }
                }
            }
            None => {
                debug!(
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    "Skipping event with unknown or mismatched payload"
                );
            }
        }

        self.version = event.version;
    }

    fn set_status(&mut self, event: &Event, status: CommandStatus) {
        match self.graph.get_mut(&event.aggregate_id) {
            Some(node) => node.status = status,
            None => {
                let missing = event.aggregate_id.clone();
                self.count_orphan(event, &missing);
            }
        }
    }

    fn count_orphan(&mut self, event: &Event, missing_id: &str) {
        self.orphaned_events += 1;
        warn!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            missing_id,
            "Orphaned event references an unknown node; skipped"
        );
        counter!("ledger_orphaned_events_total").increment(1);
    }

    /// Persist the current graph and version as this aggregate's snapshot,
    /// replacing any previous one.
    pub fn take_snapshot(&self) -> Result<()> {
        self.log
            .write_snapshot(&self.aggregate_id, &self.graph, self.version)
    }
}

impl std::fmt::Debug for GraphProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphProjection")
            .field("aggregate_id", &self.aggregate_id)
            .field("version", &self.version)
            .field("nodes", &self.graph.len())
            .field("orphaned_events", &self.orphaned_events)
            .field("migration_gaps", &self.migration_gaps)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
