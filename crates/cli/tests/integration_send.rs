//! Integration tests for the `team-chat` CLI binary: init, send, read, ack.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn team_chat(data_root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("team-chat").unwrap();
    cmd.env("TEAM_CHAT_DATA_ROOT", data_root.path());
    cmd
}

#[test]
fn test_init_creates_team_layout() {
    let data_root = TempDir::new().unwrap();

    team_chat(&data_root)
        .args(["init", "demo", "--member", "lead", "--member", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized team 'demo'"));

    assert!(data_root.path().join("teams/demo/team.json").is_file());
}

#[test]
fn test_send_then_read_then_ack() {
    let data_root = TempDir::new().unwrap();

    team_chat(&data_root)
        .args(["init", "demo", "--member", "lead", "--member", "dev"])
        .assert()
        .success();

    team_chat(&data_root)
        .args([
            "send", "demo", "lead", "dev", "--type", "idle_notification",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent"));

    team_chat(&data_root)
        .args(["read", "demo", "dev", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 1"));

    let output = team_chat(&data_root)
        .args(["read", "demo", "dev", "--json"])
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let message_id = parsed["messages"][0]["id"].as_str().unwrap().to_string();

    team_chat(&data_root)
        .args(["ack", "demo", "dev", &message_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acked"));

    team_chat(&data_root)
        .args(["read", "demo", "dev", "--unread-only", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 0"));
}

#[test]
fn test_send_rejects_path_traversal_in_agent_name() {
    let data_root = TempDir::new().unwrap();

    team_chat(&data_root)
        .args(["init", "demo", "--member", "lead"])
        .assert()
        .success();

    team_chat(&data_root)
        .args([
            "send", "demo", "../lead", "dev", "--type", "idle_notification",
        ])
        .assert()
        .failure();

    assert!(!data_root.path().join("teams/escape").exists());
}

#[test]
fn test_doctor_check_reports_clean_team() {
    let data_root = TempDir::new().unwrap();

    team_chat(&data_root)
        .args(["init", "demo", "--member", "lead", "--member", "dev"])
        .assert()
        .success();

    team_chat(&data_root)
        .args([
            "send", "demo", "lead", "dev", "--type", "idle_notification",
        ])
        .assert()
        .success();

    team_chat(&data_root)
        .args(["doctor", "check", "demo"])
        .assert()
        .code(0);
}
