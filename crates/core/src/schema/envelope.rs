//! Envelope (message) protocol: types, normalization, validation.

use crate::error::EngineError;
use crate::identifier::validate_identifier;
use crate::time::{new_message_id, now_iso, parse_iso};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of recognized message types.
pub const MESSAGE_TYPES: &[&str] = &[
    "task_assign",
    "task_update",
    "idle_notification",
    "handoff",
    "decision_required",
    "shutdown_request",
    "shutdown_approved",
    "agent_wakeup_required",
    "agent_shutdown_required",
    "agent_started",
    "agent_stopped",
    "agent_error",
    "agent_timeout",
];

/// Closed set of priorities, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A single immutable delivery record targeted at one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub schema_version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
}

/// Fields a caller supplies when constructing a new envelope; everything
/// else is filled in by [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct NewEnvelope {
    pub id: Option<String>,
    pub kind: String,
    pub from: String,
    pub to: String,
    pub payload: Map<String, Value>,
    pub task_id: Option<String>,
    pub trace_id: Option<String>,
    pub priority: Option<Priority>,
    pub delivery_id: Option<String>,
}

/// Fill in defaults for a caller-supplied envelope and validate the result.
pub fn normalize(input: NewEnvelope) -> Result<Envelope, EngineError> {
    let envelope = Envelope {
        id: input.id.unwrap_or_else(new_message_id),
        schema_version: 1,
        kind: input.kind,
        from: input.from,
        to: input.to,
        payload: input.payload,
        created_at: now_iso(),
        task_id: input.task_id,
        trace_id: input.trace_id,
        priority: input.priority.unwrap_or_default(),
        delivery_id: input.delivery_id,
    };
    validate(&envelope)?;
    Ok(envelope)
}

/// Validate an already-constructed envelope (e.g. one read back from disk
/// during rehydration).
pub fn validate(envelope: &Envelope) -> Result<(), EngineError> {
    if envelope.id.trim().is_empty() {
        return Err(EngineError::Validation("id must not be empty".into()));
    }
    if envelope.schema_version != 1 {
        return Err(EngineError::Validation(format!(
            "unsupported schema_version {}",
            envelope.schema_version
        )));
    }
    if !MESSAGE_TYPES.contains(&envelope.kind.as_str()) {
        return Err(EngineError::Validation(format!(
            "unknown message type '{}'",
            envelope.kind
        )));
    }
    validate_identifier(&envelope.from, "from")?;
    validate_identifier(&envelope.to, "to")?;
    if parse_iso(&envelope.created_at).is_none() {
        return Err(EngineError::Validation(format!(
            "created_at '{}' is not a valid ISO-8601 UTC timestamp",
            envelope.created_at
        )));
    }
    Ok(())
}
