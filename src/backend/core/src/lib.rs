//! # Ledger Core
//!
//! An event-sourced command/task store.
//!
//! ## Architecture
//!
//! - **Event Log**: Durable append-only store of immutable domain events
//!   plus a per-aggregate snapshot store
//! - **Schema Registry & Migrator**: Backward-compatible schema evolution
//!   via chained single-step payload transforms
//! - **Graph Projection**: CQRS read model folding migrated events into a
//!   queryable command/task graph
//! - **Command Handler**: Write-side API, the sole producer of events
//! - **Telemetry**: Structured logging built on `tracing`
//!
//! ## Flow
//!
//! `CommandHandler` appends one event per command intent; a
//! `GraphProjection` later pulls an aggregate's events, migrates each to the
//! latest schema, and folds them into the graph that callers read through
//! [`events::GraphProjection::get_graph`].
//!
//! ```rust,no_run
//! use ledger_core::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> ledger_core::Result<()> {
//! let storage = ledger_core::config::StorageConfig::rooted_at("data");
//! let log = Arc::new(EventLog::open(&storage)?);
//! let handler = CommandHandler::new(log.clone());
//!
//! handler.create_command("cmd1", "build", serde_json::json!({}))?;
//! handler.start_command("cmd1")?;
//! handler.complete_command("cmd1")?;
//!
//! let migrator = Arc::new(Migrator::new(SchemaRegistry::new()));
//! let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator)?;
//! assert_eq!(projection.node("cmd1").unwrap().status, CommandStatus::Done);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorSeverity, LedgerError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LedgerConfig, ObservabilityConfig, StorageConfig};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorSeverity, LedgerError, Result};
    pub use crate::events::{
        CommandHandler, CommandPayload, CommandStatus, Event, EventId, EventKind, EventLog,
        EventPayload, GraphProjection, Migrated, MigrationGap, Migrator, ProjectionNode,
        SchemaRegistry, Snapshot, DEFAULT_SCHEMA_VERSION,
    };
    pub use crate::telemetry::{init_logging, LogFormat, LoggingConfig};
}
