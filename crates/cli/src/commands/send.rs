//! `send`: dispatch a message envelope, optionally waiting for an ack.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::path::PathBuf;
use team_chat_core::schema::{NewEnvelope, Priority};
use team_chat_core::service::SendOutcome;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Sending agent
    from: String,

    /// Recipient agent
    to: String,

    /// Message type, e.g. idle_notification, handoff, decision_required
    #[arg(long = "type")]
    kind: String,

    /// JSON payload object (defaults to `{}`)
    #[arg(long)]
    payload: Option<String>,

    /// Associated task id
    #[arg(long)]
    task_id: Option<String>,

    /// Trace id to correlate with other events
    #[arg(long)]
    trace_id: Option<String>,

    /// Priority: low, normal, high, critical
    #[arg(long, default_value = "normal")]
    priority: String,

    /// Wait for an ack (dead-letters on timeout)
    #[arg(long)]
    require_ack: bool,

    /// Override the ack timeout in seconds
    #[arg(long)]
    ack_timeout_seconds: Option<u64>,

    /// Override the max retry count before dead-lettering
    #[arg(long)]
    max_retries: Option<u32>,

    /// Suppress repeat sends to the same (recipient, task, type) within this window
    #[arg(long, default_value_t = 0)]
    cooldown_seconds: i64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: SendArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let payload: Map<String, Value> = match &args.payload {
        Some(raw) => serde_json::from_str(raw).context("payload must be a JSON object")?,
        None => Map::new(),
    };
    let priority = parse_priority(&args.priority)?;

    let new_envelope = NewEnvelope {
        id: None,
        kind: args.kind,
        from: args.from,
        to: args.to,
        payload,
        task_id: args.task_id,
        trace_id: args.trace_id,
        priority: Some(priority),
        delivery_id: None,
    };

    let outcome = service.send(
        new_envelope,
        args.require_ack,
        args.ack_timeout_seconds,
        args.max_retries,
        args.cooldown_seconds,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_human(&outcome);
    }

    Ok(0)
}

fn parse_priority(raw: &str) -> Result<Priority> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "normal" => Priority::Normal,
        "high" => Priority::High,
        "critical" => Priority::Critical,
        other => anyhow::bail!("unknown priority '{other}' (expected low, normal, high, critical)"),
    })
}

fn print_human(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Sent { message } => println!("Sent {} to {}", message.id, message.to),
        SendOutcome::Duplicate { message } => println!("Duplicate of {} (no-op)", message.id),
        SendOutcome::Suppressed { cooldown_remaining_seconds, .. } => {
            println!("Suppressed by cooldown ({cooldown_remaining_seconds}s remaining)")
        }
        SendOutcome::Acked { attempt, ack, message } => {
            println!("Acked by {} on attempt {attempt} ({})", ack.agent, message.id)
        }
        SendOutcome::DeadLetter { dead_letter, .. } => {
            println!("Dead-lettered after {} attempt(s): {}", dead_letter.attempts, dead_letter.id)
        }
    }
}
