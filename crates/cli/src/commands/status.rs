//! `status`: team overview — members, unread counts, task health.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Minutes of inactivity before a message or task is considered stale
    #[arg(long, default_value_t = 90)]
    stale_minutes: i64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: StatusArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let outcome = service.status(args.stale_minutes)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Team: {}", outcome.team);
        println!("Members ({}):", outcome.members.len());
        for member in &outcome.members {
            let unread = outcome.unread_counts.get(member).copied().unwrap_or(0);
            println!("  {member:<20} {unread} unread");
        }
        println!();
        println!("Tasks: {} total, {} blocked, {} stale", outcome.task_count, outcome.blocked_tasks.len(), outcome.stale_tasks.len());
        println!("Stale messages: {}", outcome.stale_messages);
        if outcome.malformed_jsonl > 0 {
            println!("Malformed JSONL lines skipped: {}", outcome.malformed_jsonl);
        }
    }

    Ok(0)
}
