//! End-to-end scenarios exercising `MessagingService` against a real
//! temp-directory filesystem, one test per documented scenario.

use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use team_chat_core::schema::{NewEnvelope, Priority, TeamMeta};
use team_chat_core::service::{AckOutcome, SendOutcome};
use team_chat_core::time::now_iso;
use team_chat_core::{MessagingService, TeamStore};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn init_team(data_root: &Path, team: &str, members: &[&str]) -> MessagingService {
    let store = TeamStore::new(data_root, team).unwrap();
    store.ensure_layout().unwrap();
    store
        .write_team_meta(&TeamMeta {
            team: team.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            schema_version: 1,
            created_at: now_iso(),
        })
        .unwrap();
    MessagingService::new(data_root, team).unwrap()
}

fn envelope(id: &str, kind: &str, from: &str, to: &str) -> NewEnvelope {
    NewEnvelope {
        id: Some(id.to_string()),
        kind: kind.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        payload: Default::default(),
        task_id: None,
        trace_id: None,
        priority: Some(Priority::Normal),
        delivery_id: None,
    }
}

// ============================================================================
// S1 - send/read/ack flow
// ============================================================================

#[test]
fn s1_send_read_ack_flow() {
    let dir = TempDir::new().unwrap();
    let service = init_team(dir.path(), "demo", &["lead", "dev", "qa"]);

    let mut new_envelope = envelope("msg_flow_1", "task_assign", "lead", "dev");
    new_envelope.task_id = Some("task_1".into());
    new_envelope.trace_id = Some("trace_1".into());
    new_envelope.payload = json!({"subject": "Build endpoint"}).as_object().unwrap().clone();

    let outcome = service.send(new_envelope, false, None, None, 0).unwrap();
    assert!(matches!(outcome, SendOutcome::Sent { .. }));

    let read = service.read("dev", true, 20, None).unwrap();
    assert_eq!(read.count, 1);
    assert_eq!(read.messages[0].id, "msg_flow_1");

    let ack = service.ack("dev", "msg_flow_1").unwrap();
    assert!(matches!(ack, AckOutcome::Acked));

    let read_after_ack = service.read("dev", true, 20, None).unwrap();
    assert_eq!(read_after_ack.count, 0);
}

// ============================================================================
// S2 - duplicate id
// ============================================================================

#[test]
fn s2_duplicate_send_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let service = init_team(dir.path(), "demo", &["lead", "dev"]);

    let first = envelope("msg_duplicate_1", "idle_notification", "dev", "lead");
    let second = envelope("msg_duplicate_1", "idle_notification", "dev", "lead");

    let first_outcome = service.send(first, false, None, None, 0).unwrap();
    let second_outcome = service.send(second, false, None, None, 0).unwrap();

    assert!(matches!(first_outcome, SendOutcome::Sent { .. }));
    assert!(matches!(second_outcome, SendOutcome::Duplicate { .. }));

    let read = service.read("lead", false, 0, None).unwrap();
    assert_eq!(read.count, 1);
}

// ============================================================================
// S3 - ack timeout -> dead letter
// ============================================================================

#[test]
fn s3_ack_timeout_dead_letters() {
    let dir = TempDir::new().unwrap();
    let service = init_team(dir.path(), "demo", &["lead", "qa"]);

    let new_envelope = envelope("msg_ack_timeout_1", "decision_required", "lead", "qa");
    let outcome = service.send(new_envelope, true, Some(1), Some(1), 0).unwrap();

    match outcome {
        SendOutcome::DeadLetter { dead_letter, .. } => {
            assert_eq!(dead_letter.message_id, "msg_ack_timeout_1");
            assert_eq!(dead_letter.attempts, 2);
        }
        other => panic!("expected dead_letter, got {other:?}"),
    }
}

// ============================================================================
// S4 - cooldown suppression
// ============================================================================

#[test]
fn s4_cooldown_suppresses_repeat_send() {
    let dir = TempDir::new().unwrap();
    let service = init_team(dir.path(), "demo", &["lead", "dev"]);

    let first = envelope("msg_cooldown_1", "idle_notification", "dev", "lead");
    let second = envelope("msg_cooldown_2", "idle_notification", "dev", "lead");

    let first_outcome = service.send(first, false, None, None, 120).unwrap();
    let second_outcome = service.send(second, false, None, None, 120).unwrap();

    assert!(matches!(first_outcome, SendOutcome::Sent { .. }));
    assert!(matches!(second_outcome, SendOutcome::Suppressed { .. }));

    let read = service.read("lead", false, 0, None).unwrap();
    assert_eq!(read.count, 1);
}

// ============================================================================
// S5 - trace pagination equivalence
// ============================================================================

#[test]
fn s5_paginated_trace_matches_full_trace() {
    let dir = TempDir::new().unwrap();
    let service = init_team(dir.path(), "demo", &["lead", "dev"]);

    for i in 0..30 {
        let mut new_envelope = envelope(&format!("msg_regression_{i}"), "handoff", "lead", "dev");
        new_envelope.trace_id = Some("trace_regression".into());
        service.send(new_envelope, false, None, None, 0).unwrap();
    }

    let full = service.trace("trace_regression", 0, None).unwrap();
    let full_ids: Vec<String> = full.events.iter().map(|e| e.id.clone()).collect();

    let mut paged_ids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service.trace("trace_regression", 7, cursor.as_deref()).unwrap();
        paged_ids.extend(page.events.iter().map(|e| e.id.clone()).rev());
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    paged_ids.reverse();

    assert_eq!(full_ids.len(), paged_ids.len());
    let full_set: HashSet<_> = full_ids.iter().collect();
    let paged_set: HashSet<_> = paged_ids.iter().collect();
    assert_eq!(full_set, paged_set);

    let mut full_sorted = full_ids.clone();
    let mut paged_sorted = paged_ids.clone();
    full_sorted.sort();
    paged_sorted.sort();
    assert_eq!(full_sorted, paged_sorted);
}

// ============================================================================
// S6 - path traversal rejection
// ============================================================================

#[test]
fn s6_path_traversal_is_rejected() {
    let dir = TempDir::new().unwrap();

    assert!(TeamStore::new(dir.path(), "../escape").is_err());

    let service = init_team(dir.path(), "demo", &["lead", "dev"]);
    assert!(service.read("../escape", false, 0, None).is_err());

    let bad_from = envelope("msg_bad_from", "idle_notification", "../lead", "dev");
    assert!(service.send(bad_from, false, None, None, 0).is_err());

    let bad_to = envelope("msg_bad_to", "idle_notification", "lead", "../../dev");
    assert!(service.send(bad_to, false, None, None, 0).is_err());

    let teams_dir = dir.path().join("teams");
    assert!(!teams_dir.join("escape").exists());
}
