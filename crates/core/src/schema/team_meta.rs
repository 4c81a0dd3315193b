//! Team metadata, written once by `init` if absent.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMeta {
    pub team: String,
    pub members: Vec<String>,
    pub schema_version: u32,
    pub created_at: String,
}
