//! Time and identifier-generation helpers
//!
//! All timestamps exposed by the engine are formatted as
//! `YYYY-MM-DDTHH:MM:SSZ` (second precision, UTC) to match the wire format
//! consumed by other teams' tooling.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;

/// Current time formatted as the wire's ISO-8601 UTC representation.
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Format a `DateTime<Utc>` as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse the wire ISO-8601 format (tolerant of sub-second precision).
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Seconds between `earlier` and now (saturating at zero for the future).
pub fn age_seconds(earlier: DateTime<Utc>) -> i64 {
    (Utc::now() - earlier).num_seconds().max(0)
}

/// Generate a 12 lowercase-hex-like alphanumeric suffix for ids.
///
/// Uses the full alphanumeric alphabet rather than strict hex: the wire
/// format only requires uniqueness and a fixed 12-character length, and a
/// wider alphabet reduces birthday-paradox collisions at the same length.
fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn new_message_id() -> String {
    format!("msg_{}", random_suffix(12))
}

pub fn new_event_id() -> String {
    format!("evt_{}", random_suffix(12))
}

pub fn new_dead_letter_id() -> String {
    format!("dlq_{}", random_suffix(12))
}
