//! Integration tests for the command graph read model.
//!
//! End-to-end flows through `CommandHandler` -> `EventLog` ->
//! `GraphProjection`, including snapshot-assisted rebuilds.

use ledger_core::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn fixture() -> (tempfile::TempDir, Arc<EventLog>, CommandHandler, Arc<Migrator>) {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(EventLog::open(&StorageConfig::rooted_at(dir.path())).unwrap());
    let handler = CommandHandler::new(log.clone());
    let migrator = Arc::new(Migrator::new(SchemaRegistry::new()));
    (dir, log, handler, migrator)
}

#[test]
fn full_lifecycle_materializes_a_done_node() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    handler.start_command("cmd1").unwrap();
    handler.complete_command("cmd1").unwrap();

    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    let graph = projection.get_graph();

    assert_eq!(graph.len(), 1);
    let node = &graph["cmd1"];
    assert_eq!(node.id, "cmd1");
    assert_eq!(node.command_type, "build");
    assert_eq!(node.args, json!({}));
    assert_eq!(node.status, CommandStatus::Done);
    assert!(node.children.is_empty());
}

#[test]
fn failure_path_materializes_an_error_node() {
    let (_dir, log, handler, migrator) = fixture();

    handler
        .create_command("cmd1", "deploy", json!({"env": "prod"}))
        .unwrap();
    handler.start_command("cmd1").unwrap();
    handler
        .fail_command_with_reason("cmd1", "rollout timed out")
        .unwrap();

    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    let node = projection.node("cmd1").unwrap();
    assert_eq!(node.status, CommandStatus::Error);
}

#[test]
fn status_tracks_the_latest_lifecycle_event() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    {
        let projection =
            GraphProjection::build_from_snapshot("cmd1", log.clone(), migrator.clone()).unwrap();
        assert_eq!(projection.node("cmd1").unwrap().status, CommandStatus::Pending);
    }

    handler.start_command("cmd1").unwrap();
    {
        let projection =
            GraphProjection::build_from_snapshot("cmd1", log.clone(), migrator.clone()).unwrap();
        assert_eq!(projection.node("cmd1").unwrap().status, CommandStatus::Running);
    }

    handler.complete_command("cmd1").unwrap();
    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert_eq!(projection.node("cmd1").unwrap().status, CommandStatus::Done);
}

#[test]
fn replay_is_deterministic() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({"a": 1})).unwrap();
    handler.start_command("cmd1").unwrap();
    handler
        .create_child_command("cmd2", "cmd1", "test", json!({}))
        .unwrap();
    handler.complete_command("cmd1").unwrap();

    let first = GraphProjection::build_from_snapshot("cmd1", log.clone(), migrator.clone())
        .unwrap()
        .get_graph();
    let second = GraphProjection::build_from_snapshot("cmd1", log, migrator)
        .unwrap()
        .get_graph();

    assert_eq!(first, second);
}

#[test]
fn rebuild_from_snapshot_matches_full_replay() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    handler.start_command("cmd1").unwrap();
    handler.complete_command("cmd1").unwrap();

    let replayed =
        GraphProjection::build_from_snapshot("cmd1", log.clone(), migrator.clone()).unwrap();
    replayed.take_snapshot().unwrap();

    // A fresh projection now starts from the snapshot instead of event zero.
    let restored = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert_eq!(restored.get_graph(), replayed.get_graph());
    assert_eq!(restored.version(), replayed.version());
}

#[test]
fn snapshot_resumes_replay_from_its_version() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    let projection =
        GraphProjection::build_from_snapshot("cmd1", log.clone(), migrator.clone()).unwrap();
    projection.take_snapshot().unwrap();

    // Events stamped with a version above the snapshot's are picked up on
    // the next build.
    log.append("cmd1", CommandPayload::CommandStarted.into(), 2)
        .unwrap();

    let rebuilt = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert_eq!(rebuilt.node("cmd1").unwrap().status, CommandStatus::Running);
    assert_eq!(rebuilt.version(), 2);
}

#[test]
fn child_links_appear_exactly_once() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    handler
        .create_child_command("cmd2", "cmd1", "test", json!({}))
        .unwrap();
    // Redelivery of the same link.
    handler
        .create_child_command("cmd2", "cmd1", "test", json!({}))
        .unwrap();
    handler
        .create_child_command("cmd3", "cmd1", "lint", json!({}))
        .unwrap();

    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert_eq!(projection.node("cmd1").unwrap().children, vec!["cmd2", "cmd3"]);
}

#[test]
fn foreign_event_type_with_lookalike_payload_is_skipped() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    // An unknown event type whose raw payload decodes to the same shape as a
    // known lifecycle payload. The type string disagrees, so the fold must
    // leave the node untouched.
    log.append_raw("COMMAND_PAUSED", "cmd1", json!({"kind": "COMMAND_STARTED"}), 1)
        .unwrap();

    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert_eq!(projection.node("cmd1").unwrap().status, CommandStatus::Pending);
    assert_eq!(projection.orphaned_event_count(), 0);
}

#[test]
fn orphaned_lifecycle_events_are_counted_not_fatal() {
    let (_dir, log, handler, migrator) = fixture();

    // Lifecycle events for a command that was never created.
    handler.start_command("ghost").unwrap();
    handler.complete_command("ghost").unwrap();

    let projection = GraphProjection::build_from_snapshot("ghost", log, migrator).unwrap();
    assert!(projection.get_graph().is_empty());
    assert_eq!(projection.orphaned_event_count(), 2);
}

#[test]
fn projections_are_scoped_per_aggregate() {
    let (_dir, log, handler, migrator) = fixture();

    handler.create_command("cmd1", "build", json!({})).unwrap();
    handler.create_command("cmd2", "deploy", json!({})).unwrap();

    let projection = GraphProjection::build_from_snapshot("cmd1", log, migrator).unwrap();
    assert!(projection.node("cmd1").is_some());
    assert!(projection.node("cmd2").is_none());
}
