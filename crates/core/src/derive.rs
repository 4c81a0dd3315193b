//! Task snapshot derivation from message traffic.
//!
//! Applied on first insert of an envelope carrying a valid `task_id`. This
//! is a convenience projection, not a source of truth — `rehydrate` replays
//! every message to rebuild it, and two concurrent updates to the same task
//! may race on the final write (see `store::replace_task_snapshots`).

use crate::identifier::validate_identifier;
use crate::schema::{Envelope, TaskSnapshot};
use serde_json::Value;

/// Fold `envelope` into `existing` (or start a fresh snapshot) per the
/// per-type overlay rules. Returns `None` if `envelope.task_id` is absent or
/// fails identifier validation — callers should skip derivation silently in
/// that case rather than error out.
pub fn derive_task_snapshot(envelope: &Envelope, existing: Option<TaskSnapshot>) -> Option<TaskSnapshot> {
    let task_id = envelope.task_id.as_deref()?;
    if validate_identifier(task_id, "task_id").is_err() {
        return None;
    }

    let mut snapshot = existing.unwrap_or_else(|| TaskSnapshot {
        task_id: task_id.to_string(),
        owner: None,
        status: None,
        assigned_by: None,
        subject: None,
        details: None,
        progress: None,
        eta: None,
        blocked: false,
        note: None,
        trace_id: None,
        created_at: envelope.created_at.clone(),
        updated_at: envelope.created_at.clone(),
        last_update_from: None,
    });

    match envelope.kind.as_str() {
        "task_assign" => {
            snapshot.status = Some("assigned".to_string());
            snapshot.owner = Some(envelope.to.clone());
            snapshot.assigned_by = Some(envelope.from.clone());
            if let Some(subject) = string_field(envelope, "subject") {
                snapshot.subject = Some(subject);
            }
            if let Some(details) = string_field(envelope, "details") {
                snapshot.details = Some(details);
            }
        }
        "task_update" => {
            if let Some(status) = string_field(envelope, "status") {
                snapshot.status = Some(status);
            }
            if let Some(progress) = envelope.payload.get("progress") {
                snapshot.progress = Some(progress.clone());
            }
            if let Some(eta) = string_field(envelope, "eta") {
                snapshot.eta = Some(eta);
            }
            if let Some(blocked) = envelope.payload.get("blocked") {
                snapshot.blocked = coerce_bool(blocked);
            }
            if let Some(note) = string_field(envelope, "note") {
                snapshot.note = Some(note);
            }
            snapshot.last_update_from = Some(envelope.from.clone());
        }
        _ => {
            if snapshot.owner.is_none() {
                snapshot.owner = Some(envelope.to.clone());
            }
            if snapshot.trace_id.is_none() {
                snapshot.trace_id = envelope.trace_id.clone();
            }
        }
    }

    if snapshot.trace_id.is_none() {
        snapshot.trace_id = envelope.trace_id.clone();
    }
    snapshot.updated_at = envelope.created_at.clone();
    Some(snapshot)
}

fn string_field(envelope: &Envelope, field: &str) -> Option<String> {
    envelope.payload.get(field).and_then(Value::as_str).map(str::to_string)
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
