//! Event protocol: the durable audit trail of every engine operation.

use crate::time::{new_event_id, now_iso};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub schema_version: u32,
    pub kind: String,
    pub team: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Build a new event with a fresh id and current timestamp.
pub fn new_event(
    kind: impl Into<String>,
    team: impl Into<String>,
    payload: Map<String, Value>,
    trace_id: Option<String>,
    task_id: Option<String>,
) -> Event {
    Event {
        id: new_event_id(),
        schema_version: 1,
        kind: kind.into(),
        team: team.into(),
        payload,
        created_at: now_iso(),
        trace_id,
        task_id,
    }
}

/// An event matches a trace id if it is the event's own `trace_id`, its
/// payload's `trace_id`, or the `trace_id` nested in a carried message.
pub fn matches_trace(event: &Event, trace_id: &str) -> bool {
    if event.trace_id.as_deref() == Some(trace_id) {
        return true;
    }
    if event.payload.get("trace_id").and_then(Value::as_str) == Some(trace_id) {
        return true;
    }
    if let Some(message) = event.payload.get("message") {
        if message.get("trace_id").and_then(Value::as_str) == Some(trace_id) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_own_trace_id() {
        let ev = new_event("message_sent", "demo", Map::new(), Some("t1".into()), None);
        assert!(matches_trace(&ev, "t1"));
        assert!(!matches_trace(&ev, "t2"));
    }

    #[test]
    fn matches_payload_trace_id() {
        let mut payload = Map::new();
        payload.insert("trace_id".into(), json!("t2"));
        let ev = new_event("message_sent", "demo", payload, None, None);
        assert!(matches_trace(&ev, "t2"));
    }

    #[test]
    fn matches_nested_message_trace_id() {
        let mut payload = Map::new();
        payload.insert("message".into(), json!({"trace_id": "t3"}));
        let ev = new_event("message_sent", "demo", payload, None, None);
        assert!(matches_trace(&ev, "t3"));
    }
}
