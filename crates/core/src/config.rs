//! Per-team `config.json`: ack-policy overrides.

use crate::io::read_json_optional;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Ack-wait policy for a single message type (or the `default` entry).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AckPolicyEntry {
    pub ack_timeout_seconds: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default)]
    pub ack_policy: HashMap<String, AckPolicyEntry>,
}

/// Built-in defaults, overridden per-type by `config.json`'s `ack_policy`.
fn builtin_defaults() -> HashMap<&'static str, AckPolicyEntry> {
    HashMap::from([
        ("default", AckPolicyEntry { ack_timeout_seconds: 60, max_retries: 2 }),
        ("decision_required", AckPolicyEntry { ack_timeout_seconds: 180, max_retries: 3 }),
        ("shutdown_request", AckPolicyEntry { ack_timeout_seconds: 180, max_retries: 2 }),
    ])
}

/// Load `config.json` from a team directory, if present.
pub fn load_team_config(team_dir: &Path) -> Result<TeamConfig, crate::error::EngineError> {
    Ok(read_json_optional(&team_dir.join("config.json"))?.unwrap_or_default())
}

/// Resolve the effective ack policy for `message_type`, merging built-in
/// defaults with any `config.json` overrides for that type (falling back to
/// the `default` entry, then the hard-coded default).
pub fn ack_policy_for_type(config: &TeamConfig, message_type: &str) -> AckPolicyEntry {
    let defaults = builtin_defaults();
    let base = defaults
        .get(message_type)
        .copied()
        .unwrap_or(defaults["default"]);

    config
        .ack_policy
        .get(message_type)
        .or_else(|| config.ack_policy.get("default"))
        .copied()
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_builtin_defaults() {
        let cfg = TeamConfig::default();
        let policy = ack_policy_for_type(&cfg, "handoff");
        assert_eq!(policy.ack_timeout_seconds, 60);
        assert_eq!(policy.max_retries, 2);
    }

    #[test]
    fn decision_required_has_longer_defaults() {
        let cfg = TeamConfig::default();
        let policy = ack_policy_for_type(&cfg, "decision_required");
        assert_eq!(policy.ack_timeout_seconds, 180);
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn config_override_wins() {
        let mut cfg = TeamConfig::default();
        cfg.ack_policy.insert(
            "handoff".into(),
            AckPolicyEntry { ack_timeout_seconds: 5, max_retries: 1 },
        );
        let policy = ack_policy_for_type(&cfg, "handoff");
        assert_eq!(policy.ack_timeout_seconds, 5);
        assert_eq!(policy.max_retries, 1);
    }

    #[test]
    fn config_default_override_applies_to_unknown_type() {
        let mut cfg = TeamConfig::default();
        cfg.ack_policy.insert(
            "default".into(),
            AckPolicyEntry { ack_timeout_seconds: 30, max_retries: 0 },
        );
        let policy = ack_policy_for_type(&cfg, "idle_notification");
        assert_eq!(policy.ack_timeout_seconds, 30);
        assert_eq!(policy.max_retries, 0);
    }
}
