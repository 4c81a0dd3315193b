//! `doctor`: consistency checks over a team's logs and derived indexes.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use team_chat_core::MessagingService;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(subcommand)]
    command: DoctorCommand,
}

#[derive(Subcommand, Debug)]
enum DoctorCommand {
    /// Run all named consistency checks
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Max ids sampled per inbox for the inbox/index consistency check
    #[arg(long, default_value_t = 100)]
    sample_size: usize,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: DoctorArgs) -> Result<i32> {
    match args.command {
        DoctorCommand::Check(check) => run_check(check),
    }
}

fn run_check(args: CheckArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let service = MessagingService::new(&data_root, &args.team).context("constructing messaging service")?;

    let report = service.doctor_check(args.sample_size)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Doctor report for '{}': {:?}", report.team, report.overall_status);
        for check in &report.checks {
            println!("  [{:?}] {}: {}", check.status, check.name, check.summary);
        }
        for recommendation in &report.recommendations {
            println!("  -> {recommendation}");
        }
    }

    Ok(report.exit_code)
}
