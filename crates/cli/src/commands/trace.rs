//! `trace`: filter the event log to a single trace id.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Trace id to follow
    trace_id: String,

    /// Maximum events to return (<= 0 means no limit, forward chronological scan)
    #[arg(long, default_value_t = 0)]
    limit: i64,

    /// Resume after this event id
    #[arg(long)]
    cursor: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: TraceArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let outcome = service.trace(&args.trace_id, args.limit, args.cursor.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for event in &outcome.events {
            println!("[{}] {} ({})", event.created_at, event.kind, event.id);
        }
        if let Some(cursor) = &outcome.next_cursor {
            println!("next_cursor: {cursor}");
        }
    }

    Ok(0)
}
