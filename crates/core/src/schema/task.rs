//! Task snapshots derived from message traffic.
//!
//! Snapshots are a convenience projection, not a source of truth: the
//! authoritative record of a task's history is the sequence of
//! `task_assign`/`task_update` messages in the inbox logs. `rehydrate`
//! rebuilds every snapshot from that history.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_from: Option<String>,
}

impl TaskSnapshot {
    /// A task counts as blocked if its status string says so (case
    /// insensitively) or the explicit `blocked` flag is set.
    pub fn is_blocked(&self) -> bool {
        self.blocked
            || self
                .status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("blocked"))
                .unwrap_or(false)
    }
}

/// All task snapshots for a team, keyed by task id.
pub type TaskSnapshotMap = HashMap<String, TaskSnapshot>;
