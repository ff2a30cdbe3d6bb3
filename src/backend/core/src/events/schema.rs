//! Schema catalog and event migration.
//!
//! `SchemaRegistry` tracks the latest known schema version per event type.
//! `Migrator` upgrades stale events to the latest version by chaining
//! registered single-step transforms.
//!
//! Migration is best-effort and non-atomic: when a step is missing
//! mid-chain, the chain stops at the last reachable version and the gap is
//! surfaced on the result instead of being swallowed, so callers can decide
//! whether a partially migrated event is acceptable.

use metrics::counter;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ErrorCode, LedgerError, Result};

use super::event::{Event, EventPayload};

/// A pure, deterministic payload transform from one schema version to the
/// next. Receives and returns the payload as JSON.
pub type MigrationFn = Box<dyn Fn(Value) -> Value + Send + Sync>;

// =============================================================================
// Schema Registry
// =============================================================================

/// Catalog of known event payload schemas, keyed by event type and version.
///
/// An event type with no registered schema has no known latest version; the
/// migrator leaves its events untouched.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, HashMap<u32, Value>>,
    latest: HashMap<String, u32>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema document for an event type at a version.
    ///
    /// The schema itself is an opaque JSON document; the registry only
    /// interprets the version ordering.
    pub fn register(&mut self, event_type: impl Into<String>, schema: Value, version: u32) {
        let event_type = event_type.into();
        self.schemas
            .entry(event_type.clone())
            .or_default()
            .insert(version, schema);

        let latest = self.latest.entry(event_type).or_insert(version);
        if version > *latest {
            *latest = version;
        }
    }

    /// Get a schema for an event type. With `version: None`, returns the
    /// latest registered schema.
    pub fn get_schema(&self, event_type: &str, version: Option<u32>) -> Option<&Value> {
        let versions = self.schemas.get(event_type)?;
        let version = version.or_else(|| self.latest.get(event_type).copied())?;
        versions.get(&version)
    }

    /// The latest known schema version for an event type, if any.
    pub fn get_latest_version(&self, event_type: &str) -> Option<u32> {
        self.latest.get(event_type).copied()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("latest", &self.latest)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Migration Results
// =============================================================================

/// A missing migration step encountered while upgrading an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationGap {
    /// The event type being migrated.
    pub event_type: String,
    /// The version the chain stopped at.
    pub reached: u32,
    /// The latest version the registry knows about.
    pub latest: u32,
}

/// Outcome of migrating one event.
///
/// The event is always usable; `gap` is present when the chain could not
/// reach the latest registered version, in which case the event's version is
/// "possibly still stale" and callers choose whether to proceed.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// The event, upgraded as far as the registered steps allow.
    pub event: Event,
    /// The gap the chain hit, if any.
    pub gap: Option<MigrationGap>,
}

impl Migrated {
    /// Whether the event reached the latest registered schema version.
    pub fn is_complete(&self) -> bool {
        self.gap.is_none()
    }

    /// Unwrap into the (possibly partially migrated) event.
    pub fn into_event(self) -> Event {
        self.event
    }
}

// =============================================================================
// Migrator
// =============================================================================

/// Upgrades stale events to the latest schema via chained single-step
/// transforms.
pub struct Migrator {
    registry: SchemaRegistry,
    steps: HashMap<(String, u32), MigrationFn>,
}

impl Migrator {
    /// Create a migrator over a schema registry.
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            steps: HashMap::new(),
        }
    }

    /// Access the underlying schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Register one upgrade step for an event type.
    ///
    /// Only adjacent steps are accepted (`to == from + 1`); chains are built
    /// from single steps so every intermediate version stays reachable.
    /// `migration` must be pure and deterministic.
    pub fn register_migration<F>(
        &mut self,
        event_type: impl Into<String>,
        from_version: u32,
        to_version: u32,
        migration: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        if to_version != from_version + 1 {
            return Err(LedgerError::new(
                ErrorCode::InvalidMigration,
                format!(
                    "Migrations must be single-step: got {from_version} -> {to_version}"
                ),
            ));
        }
        self.steps
            .insert((event_type.into(), from_version), Box::new(migration));
        Ok(())
    }

    /// Upgrade an event to the latest registered schema version.
    ///
    /// Applies registered steps while `event.version` is behind the
    /// registry's latest version for its type, re-stamping the version after
    /// each step. Events of unknown types pass through unchanged. A missing
    /// step stops the chain and is reported via [`Migrated::gap`].
    pub fn migrate(&self, event: &Event) -> Result<Migrated> {
        let Some(latest) = self.registry.get_latest_version(&event.event_type) else {
            return Ok(Migrated {
                event: event.clone(),
                gap: None,
            });
        };

        if event.version >= latest {
            return Ok(Migrated {
                event: event.clone(),
                gap: None,
            });
        }

        let mut migrated = event.clone();
        let mut payload = serde_json::to_value(&migrated.payload)?;

        while migrated.version < latest {
            let key = (migrated.event_type.clone(), migrated.version);
            let Some(step) = self.steps.get(&key) else {
                let gap = MigrationGap {
                    event_type: migrated.event_type.clone(),
                    reached: migrated.version,
                    latest,
                };
                warn!(
                    event_type = %gap.event_type,
                    reached = gap.reached,
                    latest = gap.latest,
                    "Migration chain has a gap; event left partially migrated"
                );
                counter!(
                    "ledger_migration_gaps_total",
                    "event_type" => gap.event_type.clone(),
                )
                .increment(1);

                migrated.payload = serde_json::from_value(payload)?;
                return Ok(Migrated {
                    event: migrated,
                    gap: Some(gap),
                });
            };

            payload = step(payload);
            migrated.version += 1;
        }

        migrated.payload = serde_json::from_value(payload)?;
        Ok(Migrated {
            event: migrated,
            gap: None,
        })
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("registry", &self.registry)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
