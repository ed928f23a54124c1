//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("s40link");
    // Keep the caller's environment out of the contract
    for var in [
        "S40LINK_ADDRESS",
        "S40LINK_CHANNEL",
        "S40LINK_DEVICE",
        "S40LINK_BAUD",
        "S40LINK_NON_INTERACTIVE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("s40link"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("s40link"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_json_returns_valid_json() {
    let output = cli_cmd()
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], true);
    assert!(parsed["data"]["ports"].is_array());
}

#[test]
fn completions_command_writes_to_stdout() {
    cli_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("_s40link()"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

/// Exit code 2: usage error (unknown command, invalid arguments)
#[test]
fn exit_code_two_for_unknown_command() {
    cli_cmd()
        .arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_for_missing_required_arg() {
    cli_cmd()
        .arg("get")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("REMOTE"));
}

#[test]
fn exit_code_two_when_no_address_is_configured() {
    let dir = tempdir().expect("tempdir should be created");
    cli_cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--non-interactive", "identify"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("address"));
}

/// Exit code 3: configuration error
#[test]
fn exit_code_three_for_invalid_explicit_config() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("broken.toml");
    fs::write(&config, "invalid toml [[[").expect("write invalid config");

    cli_cmd()
        .arg("--config")
        .arg(&config)
        .arg("list-ports")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("config"));
}

#[test]
fn invalid_local_config_only_warns() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("s40link.toml"), "invalid toml [[[").expect("write config");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg("list-ports")
        .output()
        .expect("command should execute");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

#[test]
fn exit_code_three_for_unusable_session_settings() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(
        dir.path().join("s40link.toml"),
        "[connection]\naddress = \"001122334455\"\nchannel = 15\ndevice = \"/nonexistent/rfcomm99\"\n\n[session]\nquiet_period_ms = 0\n",
    )
    .expect("write config");

    cli_cmd()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--non-interactive", "identify"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("quiet period"));
}

/// Exit code 4: phone unreachable
#[test]
fn exit_code_four_for_bad_address() {
    cli_cmd()
        .args([
            "-a",
            "not-an-address",
            "-c",
            "15",
            "-d",
            "/nonexistent/rfcomm99",
            "identify",
        ])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn exit_code_four_for_missing_device() {
    cli_cmd()
        .args([
            "-a",
            "001122334455",
            "-c",
            "15",
            "-d",
            "/nonexistent/rfcomm99",
            "list",
            "/c",
        ])
        .assert()
        .failure()
        .code(4)
        .stdout(predicate::str::is_empty());
}

#[test]
fn non_interactive_delete_without_yes_is_usage_error() {
    cli_cmd()
        .args(["--non-interactive", "delete", "/c/ring.mid"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

// ============================================================================
// Unknown Command/Flag Suggestion Tests
// ============================================================================

#[test]
fn unknown_flag_suggests_similar() {
    cli_cmd()
        .arg("list-ports")
        .arg("--jason")
        .assert()
        .failure()
        .stderr(predicate::str::contains("json").or(predicate::str::contains("did you mean")));
}
