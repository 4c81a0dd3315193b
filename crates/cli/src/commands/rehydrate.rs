//! `rehydrate`: rebuild every index and task snapshot from authoritative logs.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct RehydrateArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: RehydrateArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let outcome = service.rehydrate()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "Rehydrated team '{}': {} message(s), {} event(s), {} ack(s), {} task(s)",
            outcome.team, outcome.messages_indexed, outcome.events_indexed, outcome.acks_indexed, outcome.tasks_rebuilt
        );
    }

    Ok(0)
}
