//! Integration tests for the task-agent CLI
//!
//! These tests run the actual binary against request files in a temp dir.
//! `XDG_CONFIG_HOME` points into the temp dir so a developer's own
//! config file never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get the binary to test, isolated from the user's config
fn agent_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("task-agent").unwrap();
    cmd.env("XDG_CONFIG_HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("TASK_AGENT_LOG_LEVEL")
        .env_remove("TASK_AGENT_LOG_JSON")
        .env_remove("TASK_AGENT_SHELL");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    agent_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("resolve"));
}

// ============================================================================
// VALIDATE
// ============================================================================

#[test]
fn test_validate_json_request() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "req.json",
        r#"{
  "id": "req-1",
  "task": {"id": "t1", "type": "ping", "driver": "cgi", "data": {"k": "${{secrets.sid}}"}},
  "secrets": [{"id": "sid", "type": "vault-fetch"}]
}"#,
    );

    agent_cmd(dir.path())
        .args(["validate", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Task: t1 (ping)"))
        .stdout(predicate::str::contains("Driver: cgi"))
        .stdout(predicate::str::contains("Secrets: 1"));
}

#[test]
fn test_validate_yaml_request() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "req.yaml",
        r#"
task:
  id: t1
  type: sample/exec
  data:
    script:
      - echo hello
"#,
    );

    agent_cmd(dir.path())
        .args(["validate", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task: t1 (sample/exec)"))
        .stdout(predicate::str::contains("Secrets: 0"));
}

#[test]
fn test_validate_malformed_request() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "req.json", "{ not json");

    agent_cmd(dir.path())
        .args(["validate", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");

    agent_cmd(dir.path())
        .args(["validate", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

// ============================================================================
// RUN
// ============================================================================

#[test]
fn test_run_unknown_type_fails() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "req.json", r#"{"task": {"id": "t1", "type": "ping"}}"#);

    agent_cmd(dir.path())
        .args(["run", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("handler not found"))
        .stderr(predicate::str::contains("Register a handler"));
}

#[cfg(unix)]
#[test]
fn test_run_exec_pretty() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "req.json",
        r#"{"task": {"id": "t1", "type": "sample/exec", "data": {"script": ["echo hello"]}}}"#,
    );

    agent_cmd(dir.path())
        .args(["run", &file, "--pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exit_code\": 0"))
        .stdout(predicate::str::contains("hello"));
}

#[cfg(unix)]
#[test]
fn test_run_file_secret_is_masked() {
    let dir = TempDir::new().unwrap();
    let secret_file = write(&dir, "token.txt", "hunter2");
    let request = serde_json::json!({
        "task": {
            "id": "t1",
            "type": "sample/exec",
            "data": {"script": ["echo token=${{secrets.tok}}", "echo <{ .secrets.tok | getAsBase64 }>"]}
        },
        "secrets": [
            {"id": "tok", "type": "sample/file", "data": {"path": secret_file}}
        ]
    });
    let file = write(&dir, "req.json", &request.to_string());

    agent_cmd(dir.path())
        .args(["run", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("token=[redacted]"))
        .stdout(predicate::str::contains("hunter2").not())
        .stdout(predicate::str::contains("aHVudGVyMg==").not());
}

#[cfg(unix)]
#[test]
fn test_run_failing_script_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "req.json",
        r#"{"task": {"id": "t1", "type": "sample/exec", "data": {"script": ["exit 4"]}}}"#,
    );

    agent_cmd(dir.path())
        .args(["run", &file])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"exit_code\":4"))
        .stderr(predicate::str::contains("exit status 4"));
}

// dirs only honours XDG_CONFIG_HOME on Linux
#[cfg(target_os = "linux")]
#[test]
fn test_run_reports_bad_config() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("task-agent")).unwrap();
    fs::write(dir.path().join("task-agent/config.toml"), "[log\n").unwrap();
    let file = write(&dir, "req.json", r#"{"task": {"id": "t1", "type": "ping"}}"#);

    agent_cmd(dir.path())
        .args(["run", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

// ============================================================================
// RESOLVE
// ============================================================================

#[test]
fn test_resolve_prints_masked_payload() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "payload.json",
        r#"{"auth": "<{ .secrets.sid | getAsBase64 }>", "greeting": "<{ world | getAsBase64 }>"}"#,
    );

    agent_cmd(dir.path())
        .args(["resolve", &file, "--secret", "sid=mySecretValue"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""auth":"[redacted]""#))
        .stdout(predicate::str::contains(r#""greeting":"d29ybGQ=""#))
        .stdout(predicate::str::contains("bXlTZWNyZXRWYWx1ZQ==").not())
        .stderr(predicate::str::contains("1 derived value(s) masked"));
}

#[test]
fn test_resolve_legacy_reference() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "payload.json", r#"{"user": "${{secrets.u}}", "n": 1}"#);

    agent_cmd(dir.path())
        .args(["resolve", &file, "-s", "u=admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"n":1,"user":"[redacted]"}"#));
}

#[test]
fn test_resolve_syntax_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "payload.txt", "<{ unknownFn \"x\" }>");

    agent_cmd(dir.path())
        .args(["resolve", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error evaluating expression"));
}

#[test]
fn test_resolve_rejects_bad_secret_flag() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "payload.txt", "plain");

    agent_cmd(dir.path())
        .args(["resolve", &file, "--secret", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ID=VALUE"));
}
