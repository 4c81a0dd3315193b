//! `ack`: acknowledge a message on behalf of its recipient.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::service::AckOutcome;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct AckArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Acknowledging agent
    agent: String,

    /// Message id to acknowledge
    message_id: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: AckArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let outcome = service.ack(&args.agent, &args.message_id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match &outcome {
            AckOutcome::Acked => println!("Acked {}", args.message_id),
            AckOutcome::AlreadyAcked => println!("Already acked"),
            AckOutcome::NotFound => println!("Message not found: {}", args.message_id),
            AckOutcome::WrongRecipient { expected } => {
                println!("Wrong recipient: expected {expected}")
            }
        }
    }

    let exit_code = match outcome {
        AckOutcome::Acked | AckOutcome::AlreadyAcked => 0,
        AckOutcome::NotFound | AckOutcome::WrongRecipient { .. } => 1,
    };
    Ok(exit_code)
}
