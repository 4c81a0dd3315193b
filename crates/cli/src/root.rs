//! Resolves the data root directory shared by every subcommand.

use anyhow::{bail, Result};
use std::path::PathBuf;
use team_chat_core::data_root_from_env;

/// Resolve `--data-root`, falling back to `TEAM_CHAT_DATA_ROOT`. No further
/// guessing (no cwd scan, no `~/.claude` default) — an explicit root is
/// required one way or the other.
pub fn resolve(data_root: &Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = data_root {
        return Ok(root.clone());
    }
    if let Some(root) = data_root_from_env() {
        return Ok(root);
    }
    bail!(
        "no data root: pass --data-root or set {}",
        team_chat_core::DATA_ROOT_ENV
    )
}
