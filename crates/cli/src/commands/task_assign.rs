//! `task-assign`: send a `task_assign` envelope, seeding a task snapshot.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use team_chat_core::schema::NewEnvelope;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct TaskAssignArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Assigning agent
    from: String,

    /// Assignee agent
    to: String,

    /// Task identifier
    task_id: String,

    /// Short subject line
    #[arg(long)]
    subject: Option<String>,

    /// Longer task details
    #[arg(long)]
    details: Option<String>,

    /// Trace id to correlate with other events
    #[arg(long)]
    trace_id: Option<String>,

    /// Wait for an ack (dead-letters on timeout)
    #[arg(long)]
    require_ack: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: TaskAssignArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let mut payload: Map<String, Value> = Map::new();
    if let Some(subject) = &args.subject {
        payload.insert("subject".into(), json!(subject));
    }
    if let Some(details) = &args.details {
        payload.insert("details".into(), json!(details));
    }

    let new_envelope = NewEnvelope {
        id: None,
        kind: "task_assign".into(),
        from: args.from,
        to: args.to,
        payload,
        task_id: Some(args.task_id),
        trace_id: args.trace_id,
        priority: None,
        delivery_id: None,
    };

    let outcome = service.send(new_envelope, args.require_ack, None, None, 0)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Task assigned ({})", outcome_summary(&outcome));
    }

    Ok(0)
}

fn outcome_summary(outcome: &team_chat_core::service::SendOutcome) -> &'static str {
    use team_chat_core::service::SendOutcome::*;
    match outcome {
        Sent { .. } => "sent",
        Duplicate { .. } => "duplicate",
        Suppressed { .. } => "suppressed",
        Acked { .. } => "acked",
        DeadLetter { .. } => "dead_letter",
    }
}
