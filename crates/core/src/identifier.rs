//! Identifier validation
//!
//! Every string that ends up forming part of a filesystem path (team,
//! agent, task ids, inbox basenames) must pass through [`validate_identifier`]
//! first. This is the sole gate against path traversal.

use crate::error::EngineError;

const MAX_LEN: usize = 128;

/// Validate and return a candidate identifier.
///
/// Rules: non-empty after trim, length <= 128, characters restricted to
/// `[A-Za-z0-9_.-]`, not exactly `.` or `..`, no leading `.`, no embedded
/// path separators, NUL, or whitespace.
pub fn validate_identifier(value: &str, field: &'static str) -> Result<String, EngineError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(bad(field, value, "must not be empty"));
    }
    if trimmed.len() != value.len() {
        return Err(bad(field, value, "must not have leading/trailing whitespace"));
    }
    if trimmed.chars().count() > MAX_LEN {
        return Err(bad(field, value, "exceeds maximum length"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(bad(field, value, "must not be '.' or '..'"));
    }
    if trimmed.starts_with('.') {
        return Err(bad(field, value, "must not start with '.'"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(bad(
            field,
            value,
            "must contain only letters, digits, '_', '.', or '-'",
        ));
    }

    Ok(trimmed.to_string())
}

fn bad(field: &'static str, value: &str, reason: &'static str) -> EngineError {
    EngineError::InvalidIdentifier {
        field,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_ids() {
        assert!(validate_identifier("team-lead", "agent").is_ok());
        assert!(validate_identifier("dev_1", "agent").is_ok());
        assert!(validate_identifier("task.123", "task").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_identifier("", "team").is_err());
        assert!(validate_identifier("   ", "team").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_identifier("..", "team").is_err());
        assert!(validate_identifier("../escape", "team").is_err());
        assert!(validate_identifier("a/b", "team").is_err());
        assert!(validate_identifier("a\\b", "team").is_err());
        assert!(validate_identifier(".hidden", "team").is_err());
    }

    #[test]
    fn rejects_control_and_whitespace() {
        assert!(validate_identifier("a b", "team").is_err());
        assert!(validate_identifier("a\0b", "team").is_err());
        assert!(validate_identifier("a\nb", "team").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(200);
        assert!(validate_identifier(&long, "team").is_err());
    }
}
