//! `doctor_check`: a fixed set of named consistency checks over a team's
//! logs and derived indexes.

use crate::error::EngineError;
use crate::schema::Envelope;
use crate::store::TeamStore;
use crate::time::parse_iso;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Warn,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub summary: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub team: String,
    pub overall_status: CheckStatus,
    pub generated_at: String,
    pub exit_code: i32,
    pub checks: Vec<CheckResult>,
    pub stats: Value,
    pub recommendations: Vec<String>,
}

pub fn run_doctor_checks(store: &TeamStore, sample_size: usize) -> Result<DoctorReport, EngineError> {
    let checks = vec![
        check_index_integrity(store)?,
        check_malformed_jsonl(store)?,
        check_snapshot_monotonicity(store)?,
        check_index_inbox_sample_consistency(store, sample_size)?,
        check_ack_index_consistency(store)?,
    ];

    let overall_status = checks.iter().map(|c| c.status).max().unwrap_or(CheckStatus::Healthy);
    let exit_code = match overall_status {
        CheckStatus::Healthy => 0,
        CheckStatus::Warn => 1,
        CheckStatus::Unhealthy => 2,
    };

    let recommendations = checks
        .iter()
        .filter(|c| c.status != CheckStatus::Healthy)
        .map(|c| format!("{}: {}", c.name, c.summary))
        .collect();

    Ok(DoctorReport {
        team: store.team().to_string(),
        overall_status,
        generated_at: crate::time::now_iso(),
        exit_code,
        stats: json!({ "checks_run": checks.len() }),
        checks,
        recommendations,
    })
}

fn check_index_integrity(store: &TeamStore) -> Result<CheckResult, EngineError> {
    let mut missing = Vec::new();
    for agent in store.list_agents()? {
        let (envelopes, _) = crate::io::atomic::read_jsonl_forward::<Envelope>(&store.paths().inbox(&agent))?;
        for envelope in &envelopes {
            if store.get_message(&envelope.id)?.is_none() {
                missing.push(envelope.id.clone());
            }
        }
    }

    let status = if missing.is_empty() { CheckStatus::Healthy } else { CheckStatus::Unhealthy };
    Ok(CheckResult {
        name: "index_integrity",
        status,
        summary: format!("{} message id(s) present in an inbox but unreachable via the index", missing.len()),
        details: json!({ "missing_ids": missing }),
    })
}

fn check_malformed_jsonl(store: &TeamStore) -> Result<CheckResult, EngineError> {
    let count = store.malformed_jsonl_count()?;
    let status = if count == 0 { CheckStatus::Healthy } else { CheckStatus::Warn };
    Ok(CheckResult {
        name: "malformed_jsonl",
        status,
        summary: format!("{count} malformed JSONL line(s) skipped across all logs"),
        details: json!({ "count": count }),
    })
}

fn check_snapshot_monotonicity(store: &TeamStore) -> Result<CheckResult, EngineError> {
    let mut violations = Vec::new();
    for snapshot in store.list_task_snapshots()? {
        let created = parse_iso(&snapshot.created_at);
        let updated = parse_iso(&snapshot.updated_at);
        match (created, updated) {
            (Some(c), Some(u)) if u < c => violations.push(snapshot.task_id.clone()),
            _ => {}
        }
    }

    let status = if violations.is_empty() { CheckStatus::Healthy } else { CheckStatus::Unhealthy };
    Ok(CheckResult {
        name: "snapshot_monotonicity",
        status,
        summary: format!("{} task snapshot(s) with updated_at earlier than created_at", violations.len()),
        details: json!({ "task_ids": violations }),
    })
}

fn check_index_inbox_sample_consistency(store: &TeamStore, sample_size: usize) -> Result<CheckResult, EngineError> {
    let mut inconsistent = Vec::new();
    for agent in store.list_agents()? {
        let (envelopes, _) = crate::io::atomic::read_jsonl_forward::<Envelope>(&store.paths().inbox(&agent))?;
        for envelope in envelopes.iter().take(sample_size) {
            match store.get_message(&envelope.id)? {
                Some(found) if found.id == envelope.id => {}
                _ => inconsistent.push(envelope.id.clone()),
            }
        }
    }

    let status = if inconsistent.is_empty() { CheckStatus::Healthy } else { CheckStatus::Warn };
    Ok(CheckResult {
        name: "index_inbox_sample_consistency",
        status,
        summary: format!("{} sampled id(s) disagreed between index and inbox", inconsistent.len()),
        details: json!({ "sample_size": sample_size, "inconsistent_ids": inconsistent }),
    })
}

fn check_ack_index_consistency(store: &TeamStore) -> Result<CheckResult, EngineError> {
    let events = store.iter_events()?;
    let mut orphaned_acks = Vec::new();

    for agent in store.list_agents()? {
        let (envelopes, _) = crate::io::atomic::read_jsonl_forward::<Envelope>(&store.paths().inbox(&agent))?;
        for envelope in envelopes {
            if let Some(ack) = store.get_ack(&envelope.id)? {
                let has_event = events.iter().any(|e| {
                    e.kind == "message_acked"
                        && e.payload.get("message").and_then(|m| m.get("id")).and_then(Value::as_str) == Some(envelope.id.as_str())
                        && e.payload.get("agent").and_then(Value::as_str) == Some(ack.agent.as_str())
                });
                if !has_event {
                    orphaned_acks.push(envelope.id.clone());
                }
            }
        }
    }

    let status = if orphaned_acks.is_empty() { CheckStatus::Healthy } else { CheckStatus::Warn };
    Ok(CheckResult {
        name: "ack_index_consistency",
        status,
        summary: format!("{} ack(s) with no matching message_acked event", orphaned_acks.len()),
        details: json!({ "orphaned_acks": orphaned_acks }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, NewEnvelope};
    use tempfile::TempDir;

    #[test]
    fn healthy_team_reports_all_checks_healthy() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        let envelope = normalize(NewEnvelope {
            kind: "idle_notification".into(),
            from: "lead".into(),
            to: "dev".into(),
            ..Default::default()
        })
        .unwrap();
        store.upsert_message(&envelope).unwrap();

        let report = run_doctor_checks(&store, 100).unwrap();
        assert_eq!(report.overall_status, CheckStatus::Healthy);
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.checks.len(), 5);
    }
}
