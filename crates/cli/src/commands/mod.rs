//! CLI command dispatch and execution

use anyhow::Result;
use clap::{Parser, Subcommand};

mod ack;
mod doctor;
mod init;
mod read;
mod rehydrate;
mod send;
mod status;
mod task_assign;
mod task_update;
mod trace;

/// team-chat - a file-backed messaging control plane for agent teams
#[derive(Parser, Debug)]
#[command(
    name = "team-chat",
    version,
    about = "A file-backed messaging control plane for agent teams",
    long_about = "Append-only inboxes, a date-sharded event log, and derived task snapshots, all backed by the filesystem alone."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a team's on-disk layout and write its metadata once
    Init(init::InitArgs),

    /// Send a message envelope, optionally waiting for an ack
    Send(send::SendArgs),

    /// Send a task_assign envelope
    TaskAssign(task_assign::TaskAssignArgs),

    /// Send a task_update envelope
    TaskUpdate(task_update::TaskUpdateArgs),

    /// Read an agent's inbox, newest-first with reverse pagination
    Read(read::ReadArgs),

    /// Acknowledge a message
    Ack(ack::AckArgs),

    /// Show a team overview
    Status(status::StatusArgs),

    /// Follow the event log for a single trace id
    Trace(trace::TraceArgs),

    /// Rebuild indexes and task snapshots from authoritative logs
    Rehydrate(rehydrate::RehydrateArgs),

    /// Diagnostics
    Doctor(doctor::DoctorArgs),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code.
    pub fn execute(self) -> Result<i32> {
        match self.command {
            Commands::Init(args) => init::execute(args),
            Commands::Send(args) => send::execute(args),
            Commands::TaskAssign(args) => task_assign::execute(args),
            Commands::TaskUpdate(args) => task_update::execute(args),
            Commands::Read(args) => read::execute(args),
            Commands::Ack(args) => ack::execute(args),
            Commands::Status(args) => status::execute(args),
            Commands::Trace(args) => trace::execute(args),
            Commands::Rehydrate(args) => rehydrate::execute(args),
            Commands::Doctor(args) => doctor::execute(args),
        }
    }
}
