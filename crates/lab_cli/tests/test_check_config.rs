//! CLI tests for `lab check-config`

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn lab_command() -> Command {
    let mut cmd = Command::cargo_bin("lab").expect("lab binary");
    cmd.env("RUST_LOG", "error");
    cmd
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp config");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_check_config_accepts_valid_file() {
    let config = write_config(
        r#"
server_url = "ws://localhost:9000"
environment_id = "env-42"
initial_file = "main.py"
max_reconnect_attempts = 10
reconnect_interval = 3000
connect_debounce = 100
"#,
    );

    lab_command()
        .arg("check-config")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("ws://localhost:9000"))
        .stdout(predicate::str::contains("env-42"));
}

#[test]
fn test_check_config_rejects_missing_environment() {
    let config = write_config(
        r#"
server_url = "ws://localhost:9000"
environment_id = ""
initial_file = "main.py"
max_reconnect_attempts = 10
reconnect_interval = 3000
connect_debounce = 100
"#,
    );

    lab_command()
        .arg("check-config")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .code(101)
        .stderr(predicate::str::contains("environment_id"));
}

#[test]
fn test_check_config_rejects_non_ws_url() {
    let config = write_config(
        r#"
server_url = "http://localhost:9000"
environment_id = "env-42"
initial_file = "main.py"
max_reconnect_attempts = 10
reconnect_interval = 3000
connect_debounce = 100
"#,
    );

    lab_command()
        .arg("check-config")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .code(101)
        .stderr(predicate::str::contains("ws://"));
}

#[test]
fn test_check_config_rejects_unreadable_file() {
    lab_command()
        .arg("check-config")
        .arg("--config")
        .arg("/nonexistent/lab.toml")
        .assert()
        .failure()
        .code(101)
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_default_config_fails_without_environment() {
    // The built-in defaults have no environment id, so a bare
    // check-config reports a config failure rather than succeeding
    // silently.
    lab_command().arg("check-config").assert().failure().code(101);
}
