//! Durable append-only event log with a per-aggregate snapshot store.
//!
//! The log is a sequence of JSON records, one per line, written through an
//! `O_APPEND` handle behind a writer mutex so appends never interleave.
//! Every append is flushed and fsynced before it returns: an event is
//! visible to all subsequent reads once `append` succeeds.
//!
//! Snapshots are one JSON file per aggregate, written to a temporary sibling
//! and atomically renamed into place so readers never observe a torn file.
//!
//! Failure semantics: I/O errors are fatal and propagate to the caller with
//! no implicit retry. A log or snapshot file that exists but fails to parse
//! surfaces `MalformedLog`/`MalformedSnapshot` — it is never silently
//! treated as empty state.

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::config::StorageConfig;
use crate::error::{LedgerError, Result};

use super::event::{CommandPayload, Event, EventId, EventPayload};

/// Default schema version stamped on newly appended events.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Snapshot
// =============================================================================

/// A point-in-time materialization of derived state plus the last event
/// version folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// The materialized state.
    pub state: S,

    /// Version of the last event folded into `state`. Replay resumes from
    /// events with a strictly greater version.
    pub version: u32,
}

// =============================================================================
// Event Log
// =============================================================================

/// Durable append-only store of events plus a per-aggregate snapshot store.
///
/// There is exactly one writer role; readers are unbounded and always read
/// from disk, so a freshly opened log observes everything a previous handle
/// appended.
#[derive(Debug)]
pub struct EventLog {
    log_path: PathBuf,
    snapshot_dir: PathBuf,
    writer: Mutex<File>,
}

impl EventLog {
    /// Open (or create) an event log at the configured paths.
    ///
    /// Parent directories are created as needed. An existing log file is
    /// validated up front so corruption surfaces at open time rather than on
    /// the first replay.
    pub fn open(storage: &StorageConfig) -> Result<Self> {
        if let Some(parent) = storage.log_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LedgerError::storage(format!("create {}", parent.display()), e))?;
        }
        fs::create_dir_all(&storage.snapshot_dir).map_err(|e| {
            LedgerError::storage(format!("create {}", storage.snapshot_dir.display()), e)
        })?;

        let log = Self {
            log_path: storage.log_path.clone(),
            snapshot_dir: storage.snapshot_dir.clone(),
            writer: Mutex::new(open_append_handle(&storage.log_path)?),
        };

        // Surfaces MalformedLog before any caller trusts the store.
        log.read_all()?;

        Ok(log)
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    // -------------------------------------------------------------------------
    // Appending
    // -------------------------------------------------------------------------

    /// Append a known command lifecycle event.
    ///
    /// Stamps the event id and timestamp, persists the record, and returns
    /// the event. The record is flushed and fsynced before this returns.
    pub fn append(
        &self,
        aggregate_id: &str,
        payload: EventPayload,
        schema_version: u32,
    ) -> Result<Event> {
        let event_type = payload
            .kind()
            .ok_or_else(|| {
                LedgerError::new(
                    crate::error::ErrorCode::InvalidEventType,
                    "Raw payloads must be appended through append_raw with an explicit event type",
                )
            })?
            .as_str()
            .to_string();
        self.append_record(event_type, aggregate_id, payload, schema_version)
    }

    /// Append an event with an explicit (possibly unknown) event type and a
    /// raw JSON payload. Used by producers ahead of this reader's schema.
    pub fn append_raw(
        &self,
        event_type: &str,
        aggregate_id: &str,
        payload: serde_json::Value,
        schema_version: u32,
    ) -> Result<Event> {
        self.append_record(
            event_type.to_string(),
            aggregate_id,
            EventPayload::Raw(payload),
            schema_version,
        )
    }

    #[instrument(skip(self, payload), fields(event_type = %event_type))]
    fn append_record(
        &self,
        event_type: String,
        aggregate_id: &str,
        payload: EventPayload,
        schema_version: u32,
    ) -> Result<Event> {
        if schema_version < 1 {
            return Err(LedgerError::new(
                crate::error::ErrorCode::InvalidEventVersion,
                format!("Event version must be >= 1, got {schema_version}"),
            ));
        }

        let event = Event {
            event_id: EventId::new(),
            event_type,
            aggregate_id: aggregate_id.to_string(),
            payload,
            timestamp: Utc::now(),
            version: schema_version,
        };

        // serde_json escapes embedded newlines, so one record is one line.
        let record = serde_json::to_string(&event)?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{record}")
            .map_err(|e| LedgerError::storage(format!("append {}", self.log_path.display()), e))?;
        writer
            .flush()
            .and_then(|()| writer.sync_all())
            .map_err(|e| LedgerError::storage(format!("sync {}", self.log_path.display()), e))?;
        drop(writer);

        debug!(
            event_id = %event.event_id,
            aggregate_id = %event.aggregate_id,
            version = event.version,
            "Event appended"
        );

        Ok(event)
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Read all events in append order.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let content = match fs::read_to_string(&self.log_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LedgerError::storage(
                    format!("read {}", self.log_path.display()),
                    e,
                ))
            }
        };

        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(line).map_err(|e| {
                LedgerError::malformed_log(self.log_path.display(), index + 1, e)
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Read events for one aggregate with `version > min_version`, in append
    /// order.
    pub fn read_since(&self, aggregate_id: &str, min_version: u32) -> Result<Vec<Event>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version > min_version)
            .collect())
    }

    /// Read the events a projection scoped to `aggregate_id` must fold: the
    /// aggregate's own events plus child-link events that name it as parent.
    ///
    /// Child links are appended under the child's aggregate id, so a plain
    /// per-aggregate read would never surface them to the parent. Same
    /// `version > min_version` filter and append order as [`read_since`].
    ///
    /// [`read_since`]: EventLog::read_since
    pub fn read_linked_since(&self, aggregate_id: &str, min_version: u32) -> Result<Vec<Event>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| {
                e.version > min_version
                    && (e.aggregate_id == aggregate_id || links_to_parent(e, aggregate_id))
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Persist a snapshot for an aggregate, replacing any previous one.
    ///
    /// The snapshot is written to a temporary sibling file, fsynced, then
    /// renamed over the final path.
    #[instrument(skip(self, state))]
    pub fn write_snapshot<S: Serialize>(
        &self,
        aggregate_id: &str,
        state: &S,
        version: u32,
    ) -> Result<()> {
        let path = self.snapshot_path(aggregate_id)?;
        let tmp_path = path.with_extension("json.tmp");

        let record = serde_json::to_string_pretty(&Snapshot { state, version })?;

        let mut tmp = File::create(&tmp_path)
            .map_err(|e| LedgerError::storage(format!("create {}", tmp_path.display()), e))?;
        tmp.write_all(record.as_bytes())
            .and_then(|()| tmp.sync_all())
            .map_err(|e| LedgerError::storage(format!("write {}", tmp_path.display()), e))?;
        drop(tmp);

        fs::rename(&tmp_path, &path).map_err(|e| {
            LedgerError::storage(
                format!("rename {} -> {}", tmp_path.display(), path.display()),
                e,
            )
        })?;

        debug!(aggregate_id, version, path = %path.display(), "Snapshot written");
        Ok(())
    }

    /// Read the snapshot for an aggregate.
    ///
    /// A missing file is a legitimate empty state (`Ok(None)`); an existing
    /// file that fails to parse is `MalformedSnapshot`.
    pub fn read_snapshot<S: DeserializeOwned>(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot<S>>> {
        let path = self.snapshot_path(aggregate_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::storage(format!("read {}", path.display()), e)),
        };

        let snapshot = serde_json::from_str(&content)
            .map_err(|e| LedgerError::malformed_snapshot(path.display(), e))?;
        Ok(Some(snapshot))
    }

    fn snapshot_path(&self, aggregate_id: &str) -> Result<PathBuf> {
        validate_aggregate_id(aggregate_id)?;
        Ok(self.snapshot_dir.join(format!("{aggregate_id}.json")))
    }
}

/// Open the log file for appending, creating it if absent.
fn open_append_handle(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LedgerError::storage(format!("open {}", path.display()), e))
}

/// Whether an event is a child link naming `parent_id` as the parent.
fn links_to_parent(event: &Event, parent_id: &str) -> bool {
    matches!(
        event.payload.as_command(),
        Some(CommandPayload::ChildCommandCreated { parent_id: p, .. }) if p == parent_id
    )
}

/// Aggregate ids become snapshot file names; restrict them so an id can
/// never escape the snapshot directory.
fn validate_aggregate_id(aggregate_id: &str) -> Result<()> {
    let acceptable = !aggregate_id.is_empty()
        && aggregate_id != "."
        && aggregate_id != ".."
        && aggregate_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if acceptable {
        Ok(())
    } else {
        Err(LedgerError::invalid_aggregate_id(aggregate_id))
    }
}

// =============================================================================
// Tests
// =============================================================================
