//! Domain event definitions for the command/task store.
//!
//! This module provides:
//! - `EventKind` for the known command lifecycle event types
//! - `EventPayload`, a tagged union with one variant per lifecycle event plus
//!   a `Raw` variant so future event types do not break older readers
//! - `Event`, the immutable record persisted to the append-only log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Event IDs
// =============================================================================

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Event Kind
// =============================================================================

/// The known command lifecycle event types.
///
/// Serialized as the persisted `event_type` strings (SCREAMING_SNAKE_CASE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    CommandCreated,
    CommandStarted,
    CommandCompleted,
    CommandFailed,
    ChildCommandCreated,
}

impl EventKind {
    /// Get the persisted event type string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CommandCreated => "COMMAND_CREATED",
            Self::CommandStarted => "COMMAND_STARTED",
            Self::CommandCompleted => "COMMAND_COMPLETED",
            Self::CommandFailed => "COMMAND_FAILED",
            Self::ChildCommandCreated => "CHILD_COMMAND_CREATED",
        }
    }

    /// Parse a persisted event type string. Unknown types return `None`;
    /// readers treat those events as pass-through `Raw` data.
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "COMMAND_CREATED" => Some(Self::CommandCreated),
            "COMMAND_STARTED" => Some(Self::CommandStarted),
            "COMMAND_COMPLETED" => Some(Self::CommandCompleted),
            "COMMAND_FAILED" => Some(Self::CommandFailed),
            "CHILD_COMMAND_CREATED" => Some(Self::ChildCommandCreated),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Payload of a known command lifecycle event.
///
/// The tag is stored inside the payload object so a record stays
/// self-describing even when read without its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandPayload {
    /// A command was created.
    CommandCreated { command_type: String, args: Value },
    /// A command started executing.
    CommandStarted,
    /// A command completed successfully.
    CommandCompleted,
    /// A command failed.
    CommandFailed { reason: Option<String> },
    /// A child command was linked under a parent. This does **not** imply a
    /// `COMMAND_CREATED` for the child; materializing the child node is the
    /// caller's separate responsibility.
    ChildCommandCreated {
        parent_id: String,
        command_type: String,
        args: Value,
    },
}

impl CommandPayload {
    /// The event kind this payload belongs to.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::CommandCreated { .. } => EventKind::CommandCreated,
            Self::CommandStarted => EventKind::CommandStarted,
            Self::CommandCompleted => EventKind::CommandCompleted,
            Self::CommandFailed { .. } => EventKind::CommandFailed,
            Self::ChildCommandCreated { .. } => EventKind::ChildCommandCreated,
        }
    }
}

/// Payload of any persisted event.
///
/// Deserialization tries the known command payloads first and falls back to
/// `Raw`, so events written by newer producers survive a round-trip through
/// older readers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Command(CommandPayload),
    Raw(Value),
}

impl EventPayload {
    /// The event kind, when the payload is a known command payload.
    pub const fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Command(payload) => Some(payload.kind()),
            Self::Raw(_) => None,
        }
    }

    /// Borrow the known command payload, if any.
    pub const fn as_command(&self) -> Option<&CommandPayload> {
        match self {
            Self::Command(payload) => Some(payload),
            Self::Raw(_) => None,
        }
    }
}

impl From<CommandPayload> for EventPayload {
    fn from(payload: CommandPayload) -> Self {
        Self::Command(payload)
    }
}

// =============================================================================
// Event Record
// =============================================================================

/// An immutable domain event as persisted in the append-only log.
///
/// `version` is dual-purpose: it is both the payload's schema version
/// (consumed by the migrator) and the replay cursor compared against a
/// snapshot's version (consumed by the projection). The coupling is kept
/// deliberately; see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub event_id: EventId,

    /// Persisted event type string. Known types map to `EventKind`; unknown
    /// strings are carried verbatim for forward compatibility.
    pub event_type: String,

    /// The aggregate (command/task instance) this event pertains to.
    pub aggregate_id: String,

    /// The event payload.
    pub payload: EventPayload,

    /// When the event was appended.
    pub timestamp: DateTime<Utc>,

    /// Schema version and replay cursor, >= 1.
    pub version: u32,
}

impl Event {
    /// Parse the event type string into a known kind, if it is one.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event_type)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_id_generation() {
        let id1 = EventId::new();
        let id2 = EventId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [
            EventKind::CommandCreated,
            EventKind::CommandStarted,
            EventKind::CommandCompleted,
            EventKind::CommandFailed,
            EventKind::ChildCommandCreated,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("COMMAND_RESCHEDULED"), None);
    }

    #[test]
    fn test_command_payload_serialization() {
        let payload = EventPayload::from(CommandPayload::CommandCreated {
            command_type: "build".to_string(),
            args: json!({"target": "release"}),
        });

        let raw = serde_json::to_string(&payload).unwrap();
        assert!(raw.contains("COMMAND_CREATED"));

        let restored: EventPayload = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, payload);
        assert_eq!(restored.kind(), Some(EventKind::CommandCreated));
    }

    #[test]
    fn test_unit_payloads_stay_distinguishable() {
        let started = serde_json::to_value(EventPayload::from(CommandPayload::CommandStarted))
            .unwrap();
        let completed =
            serde_json::to_value(EventPayload::from(CommandPayload::CommandCompleted)).unwrap();
        assert_ne!(started, completed);

        let restored: EventPayload = serde_json::from_value(started).unwrap();
        assert_eq!(restored.kind(), Some(EventKind::CommandStarted));
    }

    #[test]
    fn test_unknown_payload_falls_back_to_raw() {
        let raw = json!({"kind": "COMMAND_PAUSED", "data": {"until": "later"}});
        let payload: EventPayload = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(payload.kind(), None);
        assert_eq!(payload, EventPayload::Raw(raw));
    }

    #[test]
    fn test_event_record_round_trip() {
        let event = Event {
            event_id: EventId::new(),
            event_type: EventKind::CommandFailed.as_str().to_string(),
            aggregate_id: "cmd1".to_string(),
            payload: CommandPayload::CommandFailed {
                reason: Some("timeout".to_string()),
            }
            .into(),
            timestamp: Utc::now(),
            version: 1,
        };

        let raw = serde_json::to_string(&event).unwrap();
        let restored: Event = serde_json::from_str(&raw).unwrap();

        assert_eq!(restored, event);
        assert_eq!(restored.kind(), Some(EventKind::CommandFailed));
    }
}
