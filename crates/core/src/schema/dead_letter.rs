//! Dead-letter entries: records of sends that exhausted their ack-wait budget.

use super::envelope::Envelope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub reason: String,
    pub attempts: u32,
    pub created_at: String,
    pub message: Envelope,
    pub schema_version: u32,
    pub team: String,
}
