//! `TeamStore`: the durable engine behind one team's directory tree.
//!
//! Every mutating operation here acquires the named lock its contract calls
//! for (see [`crate::io::lock`]) before touching shared state, and releases
//! it on return via `TeamLock`'s `Drop`. Reads never lock.

use crate::error::EngineError;
use crate::identifier::validate_identifier;
use crate::io::atomic::{
    append_jsonl, read_json_optional, read_jsonl_at_offset, read_jsonl_forward,
    write_json_atomic, ReverseJsonlReader,
};
use crate::io::index;
use crate::io::lock::{acquire, LockName};
use crate::paths::TeamPaths;
use crate::schema::{Ack, DeadLetterEntry, Envelope, Event, TaskSnapshot, TeamMeta};
use crate::time::{age_seconds, now_iso, parse_iso};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Message-index record: where in which inbox an envelope's line lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIndexEntry {
    pub inbox: String,
    pub created_at: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Event-index record: which date shard an event's line lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIndexEntry {
    pub file: String,
    pub created_at: String,
}

pub struct TeamStore {
    team: String,
    paths: TeamPaths,
}

impl TeamStore {
    pub fn new(data_root: &Path, team: &str) -> Result<Self, EngineError> {
        let team = validate_identifier(team, "team")?;
        let paths = TeamPaths::new(data_root, &team)?;
        Ok(Self { team, paths })
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn paths(&self) -> &TeamPaths {
        &self.paths
    }

    pub fn ensure_layout(&self) -> Result<(), EngineError> {
        self.paths.ensure_layout()
    }

    fn lock(&self, name: LockName) -> Result<crate::io::lock::TeamLock, EngineError> {
        acquire(&self.paths.locks_dir(), &self.team, name)
    }

    // ---- team metadata ----

    pub fn read_team_meta(&self) -> Result<Option<TeamMeta>, EngineError> {
        read_json_optional(&self.paths.team_meta())
    }

    pub fn write_team_meta(&self, meta: &TeamMeta) -> Result<(), EngineError> {
        write_json_atomic(&self.paths.team_meta(), meta)
    }

    // ---- messages ----

    /// Insert `envelope` if its id is unseen. Returns `true` on first insert,
    /// `false` if it is already present (caller emits `message_duplicate`).
    pub fn upsert_message(&self, envelope: &Envelope) -> Result<bool, EngineError> {
        let _lock = self.lock(LockName::Messages)?;
        let to = validate_identifier(&envelope.to, "to")?;

        if index::load_entry::<MessageIndexEntry>(
            &self.paths.message_index_shards_dir(),
            &self.paths.message_index_monolithic(),
            &envelope.id,
        )?
        .is_some()
        {
            return Ok(false);
        }

        let inbox_path = self.paths.inbox(&to);
        let appended = append_jsonl(&inbox_path, envelope)?;

        index::store_entry(
            &self.paths.message_index_shards_dir(),
            &envelope.id,
            MessageIndexEntry {
                inbox: to.clone(),
                created_at: envelope.created_at.clone(),
                to,
                offset: Some(appended.offset),
            },
        )?;
        Ok(true)
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Envelope>, EngineError> {
        if let Some(entry) = index::load_entry::<MessageIndexEntry>(
            &self.paths.message_index_shards_dir(),
            &self.paths.message_index_monolithic(),
            id,
        )? {
            let inbox_path = self.paths.inbox(&entry.inbox);
            if let Some(offset) = entry.offset {
                if let Some(env) = read_jsonl_at_offset::<Envelope>(&inbox_path, offset)? {
                    if env.id == id {
                        return Ok(Some(env));
                    }
                }
            }
            let (envs, _) = read_jsonl_forward::<Envelope>(&inbox_path)?;
            return Ok(envs.into_iter().find(|e| e.id == id));
        }

        // Not indexed (e.g. index lost before a rehydrate): fall back to a
        // full scan of every inbox.
        for agent in self.list_agents()? {
            let (envs, _) = read_jsonl_forward::<Envelope>(&self.paths.inbox(&agent))?;
            if let Some(env) = envs.into_iter().find(|e| e.id == id) {
                return Ok(Some(env));
            }
        }
        Ok(None)
    }

    /// Reverse-paginate `agent`'s inbox. Returns the page in chronological
    /// (oldest-first) order and the cursor for the next older page, if any.
    pub fn list_messages_window_for_agent(
        &self,
        agent: &str,
        unread_only: bool,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<(Vec<Envelope>, Option<String>), EngineError> {
        let agent = validate_identifier(agent, "agent")?;
        let mut reader = ReverseJsonlReader::open(&self.paths.inbox(&agent))?;

        let acked: HashMap<String, Ack> = if unread_only {
            index::load_all(&self.paths.ack_index_shards_dir(), &self.paths.ack_index_monolithic())?
        } else {
            HashMap::new()
        };

        let mut found_cursor = cursor.is_none();
        let mut newest_first: Vec<Envelope> = Vec::new();

        while let Some(env) = reader.next::<Envelope>() {
            if let Some(c) = cursor {
                if !found_cursor {
                    if env.id == c {
                        found_cursor = true;
                    }
                    continue;
                }
            }
            if unread_only && acked.contains_key(&env.id) {
                continue;
            }
            newest_first.push(env);
            if limit > 0 && newest_first.len() as i64 > limit {
                break;
            }
        }

        if cursor.is_some() && !found_cursor {
            return Ok((Vec::new(), None));
        }

        let has_more = limit > 0 && newest_first.len() as i64 > limit;
        if has_more {
            newest_first.truncate(limit as usize);
        }
        let next_cursor = if has_more {
            newest_first.last().map(|e| e.id.clone())
        } else {
            None
        };

        newest_first.reverse();
        Ok((newest_first, next_cursor))
    }

    pub fn list_agents(&self) -> Result<Vec<String>, EngineError> {
        let dir = self.paths.inboxes_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut agents = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| EngineError::io(&dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    agents.push(stem.to_string());
                }
            }
        }
        agents.sort();
        Ok(agents)
    }

    // ---- acks ----

    pub fn record_ack(&self, message_id: &str, agent: &str, acked_at: &str) -> Result<bool, EngineError> {
        let _lock = self.lock(LockName::Acks)?;
        if index::load_entry::<Ack>(
            &self.paths.ack_index_shards_dir(),
            &self.paths.ack_index_monolithic(),
            message_id,
        )?
        .is_some()
        {
            return Ok(false);
        }
        index::store_entry(
            &self.paths.ack_index_shards_dir(),
            message_id,
            Ack {
                message_id: message_id.to_string(),
                agent: agent.to_string(),
                acked_at: acked_at.to_string(),
                delivery_id: None,
            },
        )?;
        Ok(true)
    }

    pub fn get_ack(&self, message_id: &str) -> Result<Option<Ack>, EngineError> {
        index::load_entry(
            &self.paths.ack_index_shards_dir(),
            &self.paths.ack_index_monolithic(),
            message_id,
        )
    }

    // ---- events ----

    pub fn append_event(&self, event: &Event) -> Result<bool, EngineError> {
        let _lock = self.lock(LockName::Events)?;
        if index::load_entry::<EventIndexEntry>(
            &self.paths.event_index_shards_dir(),
            &self.paths.event_index_monolithic(),
            &event.id,
        )?
        .is_some()
        {
            return Ok(false);
        }

        let date = date_of(&event.created_at);
        append_jsonl(&self.paths.events_shard(&date), event)?;
        index::store_entry(
            &self.paths.event_index_shards_dir(),
            &event.id,
            EventIndexEntry { file: date, created_at: event.created_at.clone() },
        )?;
        Ok(true)
    }

    /// All events across every date shard, ordered by `(created_at, id)`.
    pub fn iter_events(&self) -> Result<Vec<Event>, EngineError> {
        let mut events = Vec::new();
        for path in self.event_shard_paths()? {
            let (mut shard, _) = read_jsonl_forward::<Event>(&path)?;
            events.append(&mut shard);
        }
        events.sort_by(|a, b| (a.created_at.as_str(), a.id.as_str()).cmp(&(b.created_at.as_str(), b.id.as_str())));
        Ok(events)
    }

    /// All events newest-first: newest date shard first, newest line first
    /// within each shard.
    pub fn iter_events_reverse(&self) -> Result<Vec<Event>, EngineError> {
        let mut paths = self.event_shard_paths()?;
        paths.sort();
        paths.reverse();

        let mut events = Vec::new();
        for path in paths {
            let mut reader = ReverseJsonlReader::open(&path)?;
            while let Some(event) = reader.next::<Event>() {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn event_shard_paths(&self) -> Result<Vec<std::path::PathBuf>, EngineError> {
        let dir = self.paths.events_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| EngineError::io(&dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    // ---- dead letter ----

    pub fn write_dead_letter(&self, entry: &DeadLetterEntry) -> Result<(), EngineError> {
        let _lock = self.lock(LockName::DeadLetter)?;
        let date = date_of(&entry.created_at);
        append_jsonl(&self.paths.dead_letter_shard(&date), entry)?;
        Ok(())
    }

    // ---- task snapshots ----

    pub fn write_task_snapshot(&self, snapshot: &TaskSnapshot) -> Result<(), EngineError> {
        let task_id = validate_identifier(&snapshot.task_id, "task_id")?;
        write_json_atomic(&self.paths.task_snapshot(&task_id), snapshot)
    }

    pub fn read_task_snapshot(&self, task_id: &str) -> Result<Option<TaskSnapshot>, EngineError> {
        let task_id = validate_identifier(task_id, "task_id")?;
        read_json_optional(&self.paths.task_snapshot(&task_id))
    }

    pub fn list_task_snapshots(&self) -> Result<Vec<TaskSnapshot>, EngineError> {
        let dir = self.paths.tasks_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut snapshots = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| EngineError::io(&dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(snap) = read_json_optional::<TaskSnapshot>(&path)? {
                snapshots.push(snap);
            }
        }
        snapshots.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(snapshots)
    }

    // ---- cooldown ledger ----

    /// Returns the remaining cooldown in seconds (0 means the caller may
    /// proceed; the ledger has just been stamped with `now`).
    pub fn check_and_record_cooldown(&self, key: &str, seconds: i64) -> Result<i64, EngineError> {
        if seconds <= 0 {
            return Ok(0);
        }
        let _lock = self.lock(LockName::NudgeCooldown)?;
        let path = self.paths.nudge_index();
        let mut ledger: HashMap<String, i64> = read_json_optional(&path)?.unwrap_or_default();

        let now = chrono::Utc::now().timestamp();
        if let Some(&last) = ledger.get(key) {
            let elapsed = now - last;
            if elapsed < seconds {
                return Ok(seconds - elapsed);
            }
        }
        ledger.insert(key.to_string(), now);
        write_json_atomic(&path, &ledger)?;
        Ok(0)
    }

    // ---- diagnostics helpers ----

    /// Sum of malformed lines encountered across every inbox and event
    /// shard. Used by `status` and the `malformed_jsonl` doctor check.
    pub fn malformed_jsonl_count(&self) -> Result<u64, EngineError> {
        let mut total = 0u64;
        for agent in self.list_agents()? {
            let (_, malformed) = read_jsonl_forward::<Envelope>(&self.paths.inbox(&agent))?;
            total += malformed.count;
        }
        for path in self.event_shard_paths()? {
            let (_, malformed) = read_jsonl_forward::<Event>(&path)?;
            total += malformed.count;
        }
        Ok(total)
    }

    pub fn stale_unread_messages(&self, older_than_seconds: i64) -> Result<Vec<Envelope>, EngineError> {
        let acked: HashMap<String, Ack> =
            index::load_all(&self.paths.ack_index_shards_dir(), &self.paths.ack_index_monolithic())?;

        let mut stale = Vec::new();
        for agent in self.list_agents()? {
            let (envs, _) = read_jsonl_forward::<Envelope>(&self.paths.inbox(&agent))?;
            for env in envs {
                if acked.contains_key(&env.id) {
                    continue;
                }
                if let Some(created) = parse_iso(&env.created_at) {
                    if age_seconds(created) > older_than_seconds {
                        stale.push(env);
                    }
                }
            }
        }
        Ok(stale)
    }

    // ---- rehydration ----

    /// Acquire the `state-rehydrate` lock for the duration of a rehydrate
    /// pass; the service layer holds this across both index and snapshot
    /// replacement so the two stay consistent with each other.
    pub fn lock_for_rehydrate(&self) -> Result<crate::io::lock::TeamLock, EngineError> {
        self.lock(LockName::StateRehydrate)
    }

    pub fn replace_state_indexes(
        &self,
        message_index: HashMap<String, MessageIndexEntry>,
        event_index: HashMap<String, EventIndexEntry>,
        ack_index: HashMap<String, Ack>,
    ) -> Result<(), EngineError> {
        index::replace_all(
            &self.paths.message_index_shards_dir(),
            &self.paths.message_index_monolithic(),
            message_index,
        )?;
        index::replace_all(
            &self.paths.event_index_shards_dir(),
            &self.paths.event_index_monolithic(),
            event_index,
        )?;
        index::replace_all(
            &self.paths.ack_index_shards_dir(),
            &self.paths.ack_index_monolithic(),
            ack_index,
        )?;
        Ok(())
    }

    pub fn replace_task_snapshots(
        &self,
        snapshots: HashMap<String, TaskSnapshot>,
    ) -> Result<(), EngineError> {
        let dir = self.paths.tasks_dir();
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;

        for entry in std::fs::read_dir(&dir).map_err(|e| EngineError::io(&dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if !snapshots.contains_key(stem) {
                std::fs::remove_file(&path).map_err(|e| EngineError::io(&path, e))?;
            }
        }

        for (task_id, snapshot) in &snapshots {
            write_json_atomic(&dir.join(format!("{task_id}.json")), snapshot)?;
        }
        Ok(())
    }
}

fn date_of(iso: &str) -> String {
    match iso.get(0..10) {
        Some(d) => d.to_string(),
        None => now_iso()[..10].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, new_event, NewEnvelope};
    use serde_json::Map;
    use tempfile::TempDir;

    fn envelope(id: &str, from: &str, to: &str, kind: &str) -> Envelope {
        normalize(NewEnvelope {
            id: Some(id.to_string()),
            kind: kind.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn upsert_is_idempotent_by_id() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();

        let env = envelope("msg_a", "lead", "dev", "task_assign");
        assert!(store.upsert_message(&env).unwrap());
        assert!(!store.upsert_message(&env).unwrap());

        let (page, _) = store.list_messages_window_for_agent("dev", false, 0, None).unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn get_message_uses_offset_fast_path() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        store.upsert_message(&envelope("msg_a", "lead", "dev", "task_assign")).unwrap();
        store.upsert_message(&envelope("msg_b", "lead", "dev", "task_assign")).unwrap();

        let got = store.get_message("msg_b").unwrap().unwrap();
        assert_eq!(got.id, "msg_b");
    }

    #[test]
    fn pagination_respects_cursor_and_limit() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        for i in 0..5 {
            store
                .upsert_message(&envelope(&format!("msg_{i}"), "lead", "dev", "idle_notification"))
                .unwrap();
        }

        // Reverse-cursor pagination walks newest-first: msg_4, msg_3, msg_2, msg_1, msg_0.
        let (page1, cursor1) = store.list_messages_window_for_agent("dev", false, 2, None).unwrap();
        assert_eq!(page1.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["msg_3", "msg_4"]);
        assert_eq!(cursor1.as_deref(), Some("msg_3"));

        let (page2, cursor2) = store
            .list_messages_window_for_agent("dev", false, 2, cursor1.as_deref())
            .unwrap();
        assert_eq!(page2.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["msg_1", "msg_2"]);
        assert_eq!(cursor2.as_deref(), Some("msg_1"));

        let (page3, cursor3) = store
            .list_messages_window_for_agent("dev", false, 2, cursor2.as_deref())
            .unwrap();
        assert_eq!(page3.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["msg_0"]);
        assert_eq!(cursor3, None);
    }

    #[test]
    fn unknown_cursor_yields_empty_page() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        store.upsert_message(&envelope("msg_a", "lead", "dev", "idle_notification")).unwrap();

        let (page, cursor) = store
            .list_messages_window_for_agent("dev", false, 10, Some("msg_missing"))
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(cursor, None);
    }

    #[test]
    fn ack_is_recorded_once() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        assert!(store.record_ack("msg_a", "dev", &now_iso()).unwrap());
        assert!(!store.record_ack("msg_a", "dev", &now_iso()).unwrap());
    }

    #[test]
    fn events_sort_by_created_at_then_id() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        let ev1 = new_event("message_sent", "demo", Map::new(), None, None);
        let ev2 = new_event("message_sent", "demo", Map::new(), None, None);
        store.append_event(&ev1).unwrap();
        store.append_event(&ev2).unwrap();

        let forward = store.iter_events().unwrap();
        assert_eq!(forward.len(), 2);
        let reverse = store.iter_events_reverse().unwrap();
        assert_eq!(reverse.len(), 2);
    }

    #[test]
    fn cooldown_suppresses_within_window() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        assert_eq!(store.check_and_record_cooldown("dev::-::idle_notification", 120).unwrap(), 0);
        let remaining = store.check_and_record_cooldown("dev::-::idle_notification", 120).unwrap();
        assert!(remaining > 0 && remaining <= 120);
    }

    #[test]
    fn cooldown_disabled_when_zero() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        assert_eq!(store.check_and_record_cooldown("dev::-::idle_notification", 0).unwrap(), 0);
        assert_eq!(store.check_and_record_cooldown("dev::-::idle_notification", 0).unwrap(), 0);
    }

    #[test]
    fn task_snapshots_round_trip_and_list() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path(), "demo").unwrap();
        store.ensure_layout().unwrap();
        let snap = TaskSnapshot {
            task_id: "task_1".into(),
            owner: Some("dev".into()),
            status: Some("assigned".into()),
            assigned_by: Some("lead".into()),
            subject: None,
            details: None,
            progress: None,
            eta: None,
            blocked: false,
            note: None,
            trace_id: None,
            created_at: now_iso(),
            updated_at: now_iso(),
            last_update_from: None,
        };
        store.write_task_snapshot(&snap).unwrap();
        let read = store.read_task_snapshot("task_1").unwrap().unwrap();
        assert_eq!(read.owner.as_deref(), Some("dev"));
        assert_eq!(store.list_task_snapshots().unwrap().len(), 1);
    }
}
