//! `read`: page through an agent's inbox, newest-first cursor semantics.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Agent whose inbox to read
    agent: String,

    /// Only return unacked messages
    #[arg(long)]
    unread_only: bool,

    /// Maximum messages to return (<= 0 means no limit)
    #[arg(long, default_value_t = 50)]
    limit: i64,

    /// Resume after this message id
    #[arg(long)]
    cursor: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: ReadArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let outcome = service.read(&args.agent, args.unread_only, args.limit, args.cursor.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{} message(s) for {}", outcome.count, outcome.agent);
        for message in &outcome.messages {
            println!("  [{}] {} -> {} ({}): {}", message.created_at, message.from, message.to, message.kind, message.id);
        }
        if let Some(cursor) = &outcome.next_cursor {
            println!("next_cursor: {cursor}");
        }
    }

    Ok(0)
}
