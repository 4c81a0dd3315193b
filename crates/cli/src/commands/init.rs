//! `init`: create a team's on-disk layout and write its metadata once.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use team_chat_core::schema::TeamMeta;
use team_chat_core::{time::now_iso, TeamStore};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Data root directory (or set TEAM_CHAT_DATA_ROOT)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Team identifier
    team: String,

    /// Member names to seed the team with
    #[arg(long = "member")]
    members: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(args: InitArgs) -> Result<i32> {
    let data_root = crate::root::resolve(&args.data_root)?;
    let store = TeamStore::new(&data_root, &args.team).context("constructing team store")?;
    store.ensure_layout()?;

    let meta = match store.read_team_meta()? {
        Some(existing) => existing,
        None => {
            let meta = TeamMeta {
                team: args.team.clone(),
                members: args.members.clone(),
                schema_version: 1,
                created_at: now_iso(),
            };
            store.write_team_meta(&meta)?;
            meta
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "team": meta.team,
            "members": meta.members,
            "created_at": meta.created_at,
        }))?);
    } else {
        println!("Initialized team '{}' ({} member(s))", meta.team, meta.members.len());
    }

    Ok(0)
}
