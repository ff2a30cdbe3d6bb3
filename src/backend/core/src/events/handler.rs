//! Write-side command API.
//!
//! `CommandHandler` is the sole producer of events: each method appends
//! exactly one event to the log and returns it. Payloads are not validated
//! here — validation is the caller's responsibility by design, keeping the
//! write side a thin, deterministic translation from intent to event.

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::error::Result;

use super::event::{CommandPayload, Event};
use super::log::{EventLog, DEFAULT_SCHEMA_VERSION};

/// Write-side API over an injected event log.
///
/// The log is passed in explicitly; there is no ambient process-wide store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    log: Arc<EventLog>,
}

impl CommandHandler {
    /// Create a handler over an event log.
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    /// Record that a command was created. The node materializes as `PENDING`
    /// with no children when the projection folds this event.
    #[instrument(skip(self, args))]
    pub fn create_command(&self, id: &str, command_type: &str, args: Value) -> Result<Event> {
        self.log.append(
            id,
            CommandPayload::CommandCreated {
                command_type: command_type.to_string(),
                args,
            }
            .into(),
            DEFAULT_SCHEMA_VERSION,
        )
    }

    /// Record that a command started executing.
    #[instrument(skip(self))]
    pub fn start_command(&self, id: &str) -> Result<Event> {
        self.log
            .append(id, CommandPayload::CommandStarted.into(), DEFAULT_SCHEMA_VERSION)
    }

    /// Record that a command completed successfully.
    #[instrument(skip(self))]
    pub fn complete_command(&self, id: &str) -> Result<Event> {
        self.log
            .append(id, CommandPayload::CommandCompleted.into(), DEFAULT_SCHEMA_VERSION)
    }

    /// Record that a command failed.
    #[instrument(skip(self))]
    pub fn fail_command(&self, id: &str) -> Result<Event> {
        self.log.append(
            id,
            CommandPayload::CommandFailed { reason: None }.into(),
            DEFAULT_SCHEMA_VERSION,
        )
    }

    /// Record that a command failed, with a reason.
    #[instrument(skip(self))]
    pub fn fail_command_with_reason(&self, id: &str, reason: &str) -> Result<Event> {
        self.log.append(
            id,
            CommandPayload::CommandFailed {
                reason: Some(reason.to_string()),
            }
            .into(),
            DEFAULT_SCHEMA_VERSION,
        )
    }

    /// Record that a child command was linked under a parent.
    ///
    /// Emits `CHILD_COMMAND_CREATED` only. It does **not** also emit
    /// `COMMAND_CREATED` for the child; callers materialize the child node
    /// with a separate [`CommandHandler::create_command`] call.
    #[instrument(skip(self, args))]
    pub fn create_child_command(
        &self,
        child_id: &str,
        parent_id: &str,
        command_type: &str,
        args: Value,
    ) -> Result<Event> {
        self.log.append(
            child_id,
            CommandPayload::ChildCommandCreated {
                parent_id: parent_id.to_string(),
                command_type: command_type.to_string(),
                args,
            }
            .into(),
            DEFAULT_SCHEMA_VERSION,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use serde_json::json;

    fn fixture() -> (tempfile::TempDir, CommandHandler, Arc<EventLog>) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(EventLog::open(&StorageConfig::rooted_at(dir.path())).unwrap());
        (dir, CommandHandler::new(log.clone()), log)
    }

    #[test]
    fn each_call_appends_exactly_one_event() {
        let (_dir, handler, log) = fixture();

        handler.create_command("cmd1", "build", json!({})).unwrap();
        handler.start_command("cmd1").unwrap();
        handler.complete_command("cmd1").unwrap();
        handler.fail_command("cmd1").unwrap();
        handler
            .create_child_command("cmd2", "cmd1", "test", json!({}))
            .unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events.iter().map(|e| e.event_type.as_str()).collect::<Vec<_>>(),
            vec![
                "COMMAND_CREATED",
                "COMMAND_STARTED",
                "COMMAND_COMPLETED",
                "COMMAND_FAILED",
                "CHILD_COMMAND_CREATED",
            ]
        );
    }

    #[test]
    fn child_creation_targets_the_child_aggregate() {
        let (_dir, handler, log) = fixture();

        handler
            .create_child_command("cmd2", "cmd1", "test", json!({"suite": "unit"}))
            .unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate_id, "cmd2");
        assert_eq!(
            events[0].payload,
            CommandPayload::ChildCommandCreated {
                parent_id: "cmd1".to_string(),
                command_type: "test".to_string(),
                args: json!({"suite": "unit"}),
            }
            .into()
        );
    }

    #[test]
    fn failure_reason_is_carried_in_the_payload() {
        let (_dir, handler, log) = fixture();

        handler
            .fail_command_with_reason("cmd1", "timeout after 30s")
            .unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(
            events[0].payload,
            CommandPayload::CommandFailed {
                reason: Some("timeout after 30s".to_string()),
            }
            .into()
        );
    }
}
