//! Data-root and per-team path resolution.
//!
//! Where the data root lives is a collaborator decision, not the engine's:
//! callers must supply it explicitly (flag or environment variable) rather
//! than have the engine guess at a workspace layout.

use crate::identifier::validate_identifier;
use std::path::{Path, PathBuf};

/// `TEAM_CHAT_DATA_ROOT` is consulted when a caller does not pass a root
/// explicitly (e.g. the CLI's `--data-root` flag).
pub const DATA_ROOT_ENV: &str = "TEAM_CHAT_DATA_ROOT";

pub fn data_root_from_env() -> Option<PathBuf> {
    std::env::var(DATA_ROOT_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Filesystem layout for one team under a data root.
#[derive(Debug, Clone)]
pub struct TeamPaths {
    pub root: PathBuf,
}

impl TeamPaths {
    pub fn new(data_root: &Path, team: &str) -> Result<Self, crate::error::EngineError> {
        let team = validate_identifier(team, "team")?;
        Ok(Self { root: data_root.join("teams").join(team) })
    }

    pub fn team_meta(&self) -> PathBuf {
        self.root.join("team.json")
    }

    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn inboxes_dir(&self) -> PathBuf {
        self.root.join("inboxes")
    }

    pub fn inbox(&self, agent: &str) -> PathBuf {
        self.inboxes_dir().join(format!("{agent}.jsonl"))
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    pub fn events_shard(&self, date: &str) -> PathBuf {
        self.events_dir().join(format!("{date}.jsonl"))
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_snapshot(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(format!("{task_id}.json"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn message_index_monolithic(&self) -> PathBuf {
        self.state_dir().join("message-index.json")
    }

    pub fn message_index_shards_dir(&self) -> PathBuf {
        self.state_dir().join("message-index-shards")
    }

    pub fn event_index_monolithic(&self) -> PathBuf {
        self.state_dir().join("event-index.json")
    }

    pub fn event_index_shards_dir(&self) -> PathBuf {
        self.state_dir().join("event-index-shards")
    }

    pub fn ack_index_monolithic(&self) -> PathBuf {
        self.state_dir().join("ack-index.json")
    }

    pub fn ack_index_shards_dir(&self) -> PathBuf {
        self.state_dir().join("ack-index-shards")
    }

    pub fn nudge_index(&self) -> PathBuf {
        self.state_dir().join("nudge-index.json")
    }

    pub fn dead_letter_dir(&self) -> PathBuf {
        self.root.join("dead-letter")
    }

    pub fn dead_letter_shard(&self, date: &str) -> PathBuf {
        self.dead_letter_dir().join(format!("{date}.jsonl"))
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn ensure_layout(&self) -> Result<(), crate::error::EngineError> {
        for dir in [
            self.inboxes_dir(),
            self.events_dir(),
            self.tasks_dir(),
            self.state_dir(),
            self.dead_letter_dir(),
            self.locks_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| crate::error::EngineError::io(&dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_traversal_in_team_name() {
        let dir = TempDir::new().unwrap();
        assert!(TeamPaths::new(dir.path(), "../escape").is_err());
    }

    #[test]
    fn ensure_layout_creates_expected_dirs() {
        let dir = TempDir::new().unwrap();
        let paths = TeamPaths::new(dir.path(), "demo").unwrap();
        paths.ensure_layout().unwrap();
        assert!(paths.inboxes_dir().is_dir());
        assert!(paths.state_dir().is_dir());
        assert!(paths.locks_dir().is_dir());
    }
}
