//! `task-update`: send a `task_update` envelope, overlaying task snapshot fields.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use team_chat_core::schema::NewEnvelope;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct TaskUpdateArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Updating agent
    from: String,

    /// Recipient agent (usually the assigner)
    to: String,

    /// Task identifier
    task_id: String,

    /// New status string
    #[arg(long)]
    status: Option<String>,

    /// Progress value (any JSON scalar)
    #[arg(long)]
    progress: Option<String>,

    /// ETA string
    #[arg(long)]
    eta: Option<String>,

    /// Mark the task as blocked
    #[arg(long)]
    blocked: bool,

    /// Free-form note
    #[arg(long)]
    note: Option<String>,

    /// Trace id to correlate with other events
    #[arg(long)]
    trace_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: TaskUpdateArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let mut payload: Map<String, Value> = Map::new();
    if let Some(status) = &args.status {
        payload.insert("status".into(), json!(status));
    }
    if let Some(progress) = &args.progress {
        payload.insert("progress".into(), json!(progress));
    }
    if let Some(eta) = &args.eta {
        payload.insert("eta".into(), json!(eta));
    }
    if args.blocked {
        payload.insert("blocked".into(), json!(true));
    }
    if let Some(note) = &args.note {
        payload.insert("note".into(), json!(note));
    }

    let new_envelope = NewEnvelope {
        id: None,
        kind: "task_update".into(),
        from: args.from,
        to: args.to,
        payload,
        task_id: Some(args.task_id),
        trace_id: args.trace_id,
        priority: None,
        delivery_id: None,
    };

    let outcome = service.send(new_envelope, false, None, None, 0)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Task updated");
    }

    Ok(0)
}
