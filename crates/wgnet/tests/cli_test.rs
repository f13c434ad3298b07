//! Integration tests for the `wgnet` CLI binary.
//!
//! Every test runs against its own temporary database and config
//! directory, so nothing touches the user's real setup.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `wgnet` binary with env isolation.
///
/// Clears `WGNET_*` variables, points config and data directories into
/// `home`, and supplies the session secret through an environment
/// variable so the system keyring is never consulted.
fn wgnet_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("wgnet");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("WGNET_CONFIG")
        .env_remove("WGNET_DB")
        .env_remove("WGNET_OUTPUT")
        .env_remove("RUST_LOG")
        .env("WGNET_AUTH__SESSION_SECRET_ENV", "WGNET_TEST_SECRET")
        .env("WGNET_TEST_SECRET", "cli-test-secret");
    cmd
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("wgnet.redb")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("wgnet.toml")
    }

    /// A command bound to this sandbox's database and config file.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = wgnet_cmd(self.dir.path());
        cmd.arg("--db").arg(self.db()).arg("--config").arg(self.config());
        cmd
    }

    fn run(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "`wgnet {}` failed:\n{}",
            args.join(" "),
            combined_output(&output)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = wgnet_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    wgnet_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("WireGuard")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("dns"))
            .and(predicate::str::contains("trust")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    wgnet_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wgnet"));
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    wgnet_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_address_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["devices", "get", "not-an-address"])
        .assert()
        .code(2);
}

// ── Users and devices ───────────────────────────────────────────────

#[test]
fn test_user_and_device_lifecycle() {
    let sandbox = Sandbox::new();

    let created = sandbox.run(&["users", "create", "alice"]);
    assert!(created.contains("alice"), "{created}");

    let listed = sandbox.run(&["users", "list", "-o", "json"]);
    let users: serde_json::Value = serde_json::from_str(&listed).unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["name"], "alice");

    let profile = sandbox.run(&["devices", "create", "--owner", "alice", "--label", "laptop"]);
    assert!(profile.contains("[Interface]"), "{profile}");
    assert!(profile.contains("Address = 172.16.0.2/24"), "{profile}");
    assert!(!profile.contains("PrivateKey = <PLACEHOLDER>"), "{profile}");

    let second = sandbox.run(&["devices", "create", "--owner", "alice", "--label", "phone"]);
    assert!(second.contains("Address = 172.16.0.3/24"), "{second}");

    // A stored profile never carries the private key.
    let stored = sandbox.run(&["devices", "config", "172.16.0.2"]);
    assert!(stored.contains("PrivateKey = <PLACEHOLDER>"), "{stored}");
    assert!(stored.contains("DNS = 172.16.0.1"), "{stored}");

    let addresses = sandbox.run(&["devices", "list", "-o", "plain"]);
    assert_eq!(addresses.trim(), "172.16.0.2\n172.16.0.3");

    sandbox.run(&["-y", "devices", "remove", "172.16.0.2"]);
    let third = sandbox.run(&["devices", "create", "--owner", "alice", "--label", "tablet"]);
    assert!(third.contains("Address = 172.16.0.2/24"), "{third}");
}

#[test]
fn test_full_tunnel_device_routes_public_space() {
    let sandbox = Sandbox::new();
    sandbox.run(&["users", "create", "bob"]);
    sandbox.run(&[
        "devices",
        "create",
        "--owner",
        "bob",
        "--label",
        "roaming",
        "--wan-forward",
    ]);

    let json = sandbox.run(&["devices", "config", "172.16.0.2", "-o", "json"]);
    let profile: serde_json::Value = serde_json::from_str(&json).unwrap();
    let allowed = profile["allowed_ips"].as_array().unwrap();
    assert_eq!(allowed.len(), 33);
    assert_eq!(allowed[0], "172.16.0.0/24");
}

#[test]
fn test_missing_device_is_not_found() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .args(["devices", "get", "172.16.0.9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("devices list"), "Expected a list hint:\n{text}");
}

#[test]
fn test_unknown_owner_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["devices", "create", "--owner", "nobody", "--label", "x"])
        .assert()
        .code(4);
}

#[test]
fn test_remove_without_yes_is_refused_non_interactively() {
    let sandbox = Sandbox::new();
    sandbox.run(&["users", "create", "carol"]);
    sandbox.run(&["devices", "create", "--owner", "carol", "--label", "laptop"]);

    sandbox
        .cmd()
        .args(["users", "remove", "carol"])
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));

    sandbox.run(&["--yes", "users", "remove", "carol"]);
    let devices = sandbox.run(&["devices", "list", "-o", "json"]);
    assert_eq!(devices.trim(), "[]");
}

#[test]
fn test_manager_gets_second_factor_secret_once() {
    let sandbox = Sandbox::new();
    let json = sandbox.run(&["users", "create", "dave", "--manager", "-o", "json"]);
    let view: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(view["user"]["is_manager"], true);
    assert!(
        view["otp"]["provisioning_uri"]
            .as_str()
            .unwrap()
            .starts_with("otpauth://totp/")
    );

    let again = sandbox.run(&["users", "get", "dave", "-o", "json"]);
    assert!(!again.contains("otpauth"), "{again}");
}

// ── DNS ─────────────────────────────────────────────────────────────

#[test]
fn test_dns_records_and_resolution() {
    let sandbox = Sandbox::new();
    sandbox.run(&["dns", "create", "NAS.lan"]);
    sandbox.run(&["dns", "set-a", "nas.lan", "172.16.0.20"]);
    sandbox.run(&["dns", "create", "files.lan"]);
    sandbox.run(&["dns", "set-cname", "files.lan", "nas.lan"]);

    let resolved = sandbox.run(&["dns", "resolve", "files.lan", "-o", "plain"]);
    assert_eq!(resolved.trim(), "172.16.0.20");

    // A CNAME cannot join existing A records.
    sandbox
        .cmd()
        .args(["dns", "set-cname", "nas.lan", "other.lan"])
        .assert()
        .code(6);

    let names = sandbox.run(&["dns", "list", "-o", "plain"]);
    assert_eq!(names.trim(), "files.lan\nnas.lan");
}

#[test]
fn test_record_on_missing_domain_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["dns", "set-a", "ghost.lan", "172.16.0.5"])
        .assert()
        .code(4);
}

#[test]
fn test_resolve_out_of_zone_cname_succeeds() {
    let sandbox = Sandbox::new();
    sandbox.run(&["dns", "create", "www.lan"]);
    sandbox.run(&["dns", "set-cname", "www.lan", "example.com"]);

    sandbox
        .cmd()
        .args(["dns", "resolve", "www.lan", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"example.com\""));

    let addresses = sandbox.run(&["dns", "resolve", "www.lan", "-o", "plain"]);
    assert!(addresses.trim().is_empty());
}

#[test]
fn test_remove_absent_record_warns_instead_of_confirming() {
    let sandbox = Sandbox::new();
    sandbox.run(&["dns", "create", "nas.lan"]);
    sandbox.run(&["dns", "set-a", "nas.lan", "172.16.0.20"]);

    sandbox
        .cmd()
        .args(["dns", "remove-a", "nas.lan", "172.16.0.99"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no A record 172.16.0.99 on nas.lan"))
        .stderr(predicate::str::contains("record removed").not());

    sandbox
        .cmd()
        .args(["dns", "remove-a", "nas.lan", "172.16.0.20"])
        .assert()
        .success()
        .stderr(predicate::str::contains("A record removed"));

    sandbox
        .cmd()
        .args(["dns", "remove-cname", "nas.lan", "other.lan"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no CNAME record other.lan on nas.lan"));
}

// ── Trust, routes, server ───────────────────────────────────────────

#[test]
fn test_trust_bootstrap_from_file() {
    let sandbox = Sandbox::new();
    sandbox.run(&["trust", "add", "10.9.9.9"]);

    let file = sandbox.dir.path().join("trusted.txt");
    std::fs::write(&file, "# gateways\n192.168.1.1\n\n192.168.1.2\n").unwrap();
    sandbox.run(&["-y", "trust", "bootstrap", "--from-file", file.to_str().unwrap()]);

    let listed = sandbox.run(&["trust", "list", "-o", "plain"]);
    assert_eq!(listed.trim(), "192.168.1.1\n192.168.1.2");
}

#[test]
fn test_routes_full_covers_subnet_and_partition() {
    let sandbox = Sandbox::new();
    let routes = sandbox.run(&["routes", "full", "-o", "plain"]);
    let lines: Vec<&str> = routes.lines().collect();
    assert_eq!(lines.len(), 33);
    assert_eq!(lines[0], "172.16.0.0/24");
    assert!(lines.contains(&"1.0.0.0/8"));
    assert!(!lines.contains(&"10.0.0.0/8"));
}

#[test]
fn test_server_reflects_config_file() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.config(),
        "[network]\ntunnel_cidr = \"10.20.0.1/16\"\nendpoint = \"vpn.example.net\"\nlisten_port = 51000\n",
    )
    .unwrap();

    let json = sandbox.run(&["server", "-o", "json"]);
    let info: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(info["tunnel_inet"], "10.20.0.1/16");
    assert_eq!(info["listen_port"], 51000);
    assert_eq!(info["endpoint"], "vpn.example.net:51000");
}

#[test]
fn test_invalid_config_reports_field() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config(), "[network]\ntunnel_cidr = \"nonsense\"\n").unwrap();

    let output = sandbox.cmd().args(["users", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("tunnel_cidr"), "Expected field name:\n{text}");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let sandbox = Sandbox::new();
    let out = sandbox.run(&["config", "path"]);
    assert_eq!(out.trim(), sandbox.config().display().to_string());
}

#[test]
fn test_config_show_redacts_secret() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.config(),
        "[auth]\nsession_secret = \"do-not-print\"\n",
    )
    .unwrap();

    let out = sandbox.run(&["config", "show"]);
    assert!(out.contains("<redacted>"), "{out}");
    assert!(!out.contains("do-not-print"), "{out}");
}
