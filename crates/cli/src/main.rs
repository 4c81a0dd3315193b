//! team-chat - a file-backed messaging control plane for agent teams
//!
//! A thin CLI over `team_chat_core::MessagingService`, exposing send, read,
//! ack, status, trace, rehydrate, and doctor-check operations with atomic
//! file I/O and no daemon or network server.

use clap::Parser;

mod commands;
mod root;

use commands::Cli;

fn main() {
    team_chat_core::logging::init();
    let cli = Cli::parse();

    match cli.execute() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
