//! Event Sourcing System
//!
//! This module provides the full event sourcing infrastructure for the
//! command/task store:
//!
//! - **`event`**: Domain events, payload tagged union, and the persisted
//!   `Event` record.
//! - **`log`**: The durable append-only `EventLog` and per-aggregate
//!   snapshot store.
//! - **`schema`**: `SchemaRegistry` version catalog and the `Migrator` for
//!   chained single-step payload upgrades.
//! - **`projection`**: `GraphProjection`, the CQRS read model folding events
//!   into a queryable command graph.
//! - **`handler`**: `CommandHandler`, the write-side API and sole producer
//!   of events.

pub mod event;
pub mod handler;
pub mod log;
pub mod projection;
pub mod schema;

pub use event::*;
pub use handler::*;
pub use log::*;
pub use projection::*;
pub use schema::*;
