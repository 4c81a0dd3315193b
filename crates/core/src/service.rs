//! `MessagingService`: orchestrates the send/read/ack/status/trace/rehydrate
//! operations on top of a [`TeamStore`].

use crate::config::{ack_policy_for_type, load_team_config, AckPolicyEntry};
use crate::derive::derive_task_snapshot;
use crate::diagnostics::{run_doctor_checks, DoctorReport};
use crate::error::EngineError;
use crate::identifier::validate_identifier;
use crate::schema::{
    new_event, normalize, validate, Ack, DeadLetterEntry, Envelope, Event, NewEnvelope,
};
use crate::store::{EventIndexEntry, MessageIndexEntry, TeamStore};
use crate::time::{age_seconds, new_dead_letter_id, now_iso, parse_iso};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::thread;
use std::time::Duration;

pub struct MessagingService {
    store: TeamStore,
}

/// Outcome of a [`send`](MessagingService::send) call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Sent { message: Envelope },
    Duplicate { message: Envelope },
    Suppressed { reason: &'static str, cooldown_remaining_seconds: i64, message: Envelope },
    Acked { attempt: u32, ack: Ack, message: Envelope },
    DeadLetter { dead_letter: DeadLetterEntry, message: Envelope },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadOutcome {
    pub team: String,
    pub agent: String,
    pub messages: Vec<Envelope>,
    pub count: usize,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckOutcome {
    Acked,
    AlreadyAcked,
    NotFound,
    WrongRecipient { expected: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutcome {
    pub team: String,
    pub members: Vec<String>,
    pub unread_counts: HashMap<String, usize>,
    pub task_count: usize,
    pub blocked_tasks: Vec<String>,
    pub stale_tasks: Vec<String>,
    pub stale_messages: usize,
    pub malformed_jsonl: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceOutcome {
    pub events: Vec<Event>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RehydrateOutcome {
    pub team: String,
    pub messages_indexed: usize,
    pub events_indexed: usize,
    pub acks_indexed: usize,
    pub tasks_rebuilt: usize,
}

impl MessagingService {
    pub fn new(data_root: &Path, team: &str) -> Result<Self, EngineError> {
        Ok(Self { store: TeamStore::new(data_root, team)? })
    }

    pub fn store(&self) -> &TeamStore {
        &self.store
    }

    #[allow(clippy::too_many_arguments)]
    pub fn send(
        &self,
        new_envelope: NewEnvelope,
        require_ack: bool,
        ack_timeout_seconds: Option<u64>,
        max_retries: Option<u32>,
        cooldown_seconds: i64,
    ) -> Result<SendOutcome, EngineError> {
        self.store.ensure_layout()?;
        let team = self.store.team().to_string();
        let envelope = normalize(new_envelope)?;

        let cooldown_key = format!(
            "{}::{}::{}",
            envelope.to,
            envelope.task_id.as_deref().unwrap_or("-"),
            envelope.kind
        );
        let remaining = self.store.check_and_record_cooldown(&cooldown_key, cooldown_seconds)?;
        if remaining > 0 {
            self.emit(&team, "message_suppressed", &envelope, None, json_payload(&[
                ("reason", Value::String("cooldown".into())),
                ("cooldown_remaining_seconds", Value::from(remaining)),
            ]))?;
            return Ok(SendOutcome::Suppressed {
                reason: "cooldown",
                cooldown_remaining_seconds: remaining,
                message: envelope,
            });
        }

        let inserted = self.store.upsert_message(&envelope)?;
        if inserted {
            self.emit(&team, "message_sent", &envelope, envelope.trace_id.clone(), Map::new())?;
            if let Some(task_id) = &envelope.task_id {
                if validate_identifier(task_id, "task_id").is_ok() {
                    let existing = self.store.read_task_snapshot(task_id)?;
                    if let Some(snapshot) = derive_task_snapshot(&envelope, existing) {
                        self.store.write_task_snapshot(&snapshot)?;
                    }
                }
            }
        } else {
            self.emit(&team, "message_duplicate", &envelope, envelope.trace_id.clone(), Map::new())?;
        }

        if !require_ack {
            return Ok(if inserted {
                SendOutcome::Sent { message: envelope }
            } else {
                SendOutcome::Duplicate { message: envelope }
            });
        }

        let config = load_team_config(&self.store.paths().root)?;
        let policy = ack_policy_for_type(&config, &envelope.kind);
        let timeout = ack_timeout_seconds.unwrap_or(policy.ack_timeout_seconds);
        let retries = max_retries.unwrap_or(policy.max_retries);

        self.wait_for_ack(&team, &envelope, timeout, retries)
    }

    fn wait_for_ack(
        &self,
        team: &str,
        envelope: &Envelope,
        timeout_seconds: u64,
        max_retries: u32,
    ) -> Result<SendOutcome, EngineError> {
        for attempt in 1..=(max_retries + 1) {
            if let Some(ack) = self.poll_for_ack(&envelope.id, timeout_seconds) {
                self.emit(team, "delivery_acked", envelope, envelope.trace_id.clone(), json_payload(&[
                    ("attempt", Value::from(attempt)),
                    ("acked_at", Value::String(ack.acked_at.clone())),
                    ("agent", Value::String(ack.agent.clone())),
                ]))?;
                return Ok(SendOutcome::Acked { attempt, ack, message: envelope.clone() });
            }

            if attempt <= max_retries {
                self.emit(team, "delivery_retry", envelope, envelope.trace_id.clone(), json_payload(&[
                    ("attempt", Value::from(attempt)),
                    ("timeout_seconds", Value::from(timeout_seconds)),
                ]))?;
            }
        }

        let dead_letter = DeadLetterEntry {
            id: new_dead_letter_id(),
            message_id: envelope.id.clone(),
            task_id: envelope.task_id.clone(),
            trace_id: envelope.trace_id.clone(),
            reason: "ack_timeout".to_string(),
            attempts: max_retries + 1,
            created_at: now_iso(),
            message: envelope.clone(),
            schema_version: 1,
            team: team.to_string(),
        };
        self.store.write_dead_letter(&dead_letter)?;
        self.emit(team, "delivery_dead_letter", envelope, envelope.trace_id.clone(), Map::new())?;
        Ok(SendOutcome::DeadLetter { dead_letter, message: envelope.clone() })
    }

    /// Poll the ack index at a 1-second cadence until `timeout_seconds` has
    /// elapsed, then perform exactly one more read after the deadline.
    fn poll_for_ack(&self, message_id: &str, timeout_seconds: u64) -> Option<Ack> {
        let timeout = Duration::from_secs(timeout_seconds.max(1));
        let deadline = std::time::Instant::now() + timeout;

        loop {
            if let Ok(Some(ack)) = self.store.get_ack(message_id) {
                return Some(ack);
            }
            if std::time::Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_secs(1).min(deadline.saturating_duration_since(std::time::Instant::now())));
        }

        self.store.get_ack(message_id).ok().flatten()
    }

    pub fn read(
        &self,
        agent: &str,
        unread_only: bool,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<ReadOutcome, EngineError> {
        self.store.ensure_layout()?;
        let (messages, next_cursor) =
            self.store.list_messages_window_for_agent(agent, unread_only, limit, cursor)?;

        let team = self.store.team().to_string();
        let mut payload = Map::new();
        payload.insert("agent".into(), Value::String(agent.to_string()));
        payload.insert("count".into(), Value::from(messages.len()));
        payload.insert("unread_only".into(), Value::Bool(unread_only));
        if let Some(c) = cursor {
            payload.insert("cursor".into(), Value::String(c.to_string()));
        }
        if let Some(nc) = &next_cursor {
            payload.insert("next_cursor".into(), Value::String(nc.clone()));
        }
        let event = new_event("inbox_read", &team, payload, None, None);
        self.store.append_event(&event)?;

        Ok(ReadOutcome {
            team,
            agent: agent.to_string(),
            count: messages.len(),
            messages,
            next_cursor,
        })
    }

    pub fn ack(&self, agent: &str, message_id: &str) -> Result<AckOutcome, EngineError> {
        self.store.ensure_layout()?;
        let team = self.store.team().to_string();
        let agent = validate_identifier(agent, "agent")?;

        let Some(envelope) = self.store.get_message(message_id)? else {
            self.emit_event(&team, "ack_rejected", json_payload(&[
                ("reason", Value::String("message_not_found".into())),
                ("message_id", Value::String(message_id.to_string())),
            ]))?;
            return Ok(AckOutcome::NotFound);
        };

        if envelope.to != agent {
            self.emit_event(&team, "ack_rejected", json_payload(&[
                ("reason", Value::String("wrong_recipient".into())),
                ("message_id", Value::String(message_id.to_string())),
                ("expected", Value::String(envelope.to.clone())),
            ]))?;
            return Ok(AckOutcome::WrongRecipient { expected: envelope.to });
        }

        let acked_at = now_iso();
        let first = self.store.record_ack(message_id, &agent, &acked_at)?;
        let kind = if first { "message_acked" } else { "message_ack_duplicate" };
        self.emit(&team, kind, &envelope, envelope.trace_id.clone(), json_payload(&[
            ("agent", Value::String(agent)),
        ]))?;

        Ok(if first { AckOutcome::Acked } else { AckOutcome::AlreadyAcked })
    }

    pub fn status(&self, stale_minutes: i64) -> Result<StatusOutcome, EngineError> {
        self.store.ensure_layout()?;
        let team = self.store.team().to_string();
        let stale_seconds = stale_minutes * 60;

        let members = self.store.list_agents()?;
        let mut unread_counts = HashMap::new();
        for member in &members {
            let (page, _) = self.store.list_messages_window_for_agent(member, true, 0, None)?;
            unread_counts.insert(member.clone(), page.len());
        }

        let snapshots = self.store.list_task_snapshots()?;
        let task_count = snapshots.len();
        let blocked_tasks = snapshots.iter().filter(|s| s.is_blocked()).map(|s| s.task_id.clone()).collect();
        let stale_tasks = snapshots
            .iter()
            .filter(|s| parse_iso(&s.updated_at).map(|t| age_seconds(t) > stale_seconds).unwrap_or(false))
            .map(|s| s.task_id.clone())
            .collect();

        let stale_messages = self.store.stale_unread_messages(stale_seconds)?.len();
        let malformed_jsonl = self.store.malformed_jsonl_count()?;

        Ok(StatusOutcome {
            team,
            members,
            unread_counts,
            task_count,
            blocked_tasks,
            stale_tasks,
            stale_messages,
            malformed_jsonl,
        })
    }

    pub fn trace(&self, trace_id: &str, limit: i64, cursor: Option<&str>) -> Result<TraceOutcome, EngineError> {
        self.store.ensure_layout()?;
        let trace_id_owned = trace_id.to_string();

        if limit <= 0 {
            let mut events = self.store.iter_events()?;
            events.retain(|e| crate::schema::matches_trace(e, &trace_id_owned));
            return Ok(TraceOutcome { events, next_cursor: None });
        }

        let mut reverse = self.store.iter_events_reverse()?;
        reverse.retain(|e| crate::schema::matches_trace(e, &trace_id_owned));

        let mut found_cursor = cursor.is_none();
        let mut newest_first = Vec::new();
        for event in reverse {
            if let Some(c) = cursor {
                if !found_cursor {
                    if event.id == c {
                        found_cursor = true;
                    }
                    continue;
                }
            }
            newest_first.push(event);
            if newest_first.len() as i64 > limit {
                break;
            }
        }

        if cursor.is_some() && !found_cursor {
            return Ok(TraceOutcome { events: Vec::new(), next_cursor: None });
        }

        let has_more = newest_first.len() as i64 > limit;
        if has_more {
            newest_first.truncate(limit as usize);
        }
        let next_cursor = if has_more { newest_first.last().map(|e| e.id.clone()) } else { None };
        newest_first.reverse();
        Ok(TraceOutcome { events: newest_first, next_cursor })
    }

    pub fn rehydrate(&self) -> Result<RehydrateOutcome, EngineError> {
        self.store.ensure_layout()?;
        let team = self.store.team().to_string();
        let _lock = self.store.lock_for_rehydrate()?;

        let mut message_index: HashMap<String, MessageIndexEntry> = HashMap::new();
        let mut task_snapshots: HashMap<String, crate::schema::TaskSnapshot> = HashMap::new();

        for agent in self.store.list_agents()? {
            let inbox_path = self.store.paths().inbox(&agent);
            let content = std::fs::read_to_string(&inbox_path).unwrap_or_default();
            let mut offset = 0u64;
            for line in content.lines() {
                let line_offset = offset;
                offset += line.len() as u64 + 1;

                let envelope = match serde_json::from_str::<Envelope>(line) {
                    Ok(envelope) => envelope,
                    Err(_) => continue,
                };
                if validate(&envelope).is_err() {
                    continue;
                }

                message_index.insert(
                    envelope.id.clone(),
                    MessageIndexEntry {
                        inbox: agent.clone(),
                        created_at: envelope.created_at.clone(),
                        to: agent.clone(),
                        offset: Some(line_offset),
                    },
                );
                if let Some(task_id) = envelope.task_id.clone() {
                    let existing = task_snapshots.get(&task_id).cloned();
                    if let Some(snapshot) = derive_task_snapshot(&envelope, existing) {
                        task_snapshots.insert(snapshot.task_id.clone(), snapshot);
                    }
                }
            }
        }

        let all_events = self.store.iter_events()?;
        let mut event_index: HashMap<String, EventIndexEntry> = HashMap::new();
        let mut ack_index: HashMap<String, Ack> = HashMap::new();
        for event in &all_events {
            event_index.insert(
                event.id.clone(),
                EventIndexEntry { file: event.created_at.get(0..10).unwrap_or("").to_string(), created_at: event.created_at.clone() },
            );
            if event.kind == "message_acked" {
                if let (Some(message_id), Some(agent_name), Some(acked_at)) = (
                    event.payload.get("message").and_then(|m| m.get("id")).and_then(Value::as_str),
                    event.payload.get("agent").and_then(Value::as_str),
                    Some(event.created_at.as_str()),
                ) {
                    ack_index.insert(
                        message_id.to_string(),
                        Ack {
                            message_id: message_id.to_string(),
                            agent: agent_name.to_string(),
                            acked_at: acked_at.to_string(),
                            delivery_id: None,
                        },
                    );
                }
            }
        }

        let messages_indexed = message_index.len();
        let events_indexed = event_index.len();
        let acks_indexed = ack_index.len();
        let tasks_rebuilt = task_snapshots.len();

        self.store.replace_state_indexes(message_index, event_index, ack_index)?;
        self.store.replace_task_snapshots(task_snapshots)?;

        let event = new_event("rehydrate_completed", &team, json_payload(&[
            ("messages_indexed", Value::from(messages_indexed)),
            ("events_indexed", Value::from(events_indexed)),
        ]), None, None);
        self.store.append_event(&event)?;

        Ok(RehydrateOutcome { team, messages_indexed, events_indexed, acks_indexed, tasks_rebuilt })
    }

    pub fn doctor_check(&self, sample_size: usize) -> Result<DoctorReport, EngineError> {
        self.store.ensure_layout()?;
        run_doctor_checks(&self.store, sample_size)
    }

    fn emit(
        &self,
        team: &str,
        kind: &str,
        envelope: &Envelope,
        trace_id: Option<String>,
        mut extra: Map<String, Value>,
    ) -> Result<(), EngineError> {
        extra.insert("message".to_string(), serde_json::to_value(envelope).unwrap_or(Value::Null));
        let event = new_event(kind, team, extra, trace_id, envelope.task_id.clone());
        self.store.append_event(&event)?;
        Ok(())
    }

    fn emit_event(&self, team: &str, kind: &str, payload: Map<String, Value>) -> Result<(), EngineError> {
        let event = new_event(kind, team, payload, None, None);
        self.store.append_event(&event)?;
        Ok(())
    }
}

fn json_payload(fields: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    map
}
