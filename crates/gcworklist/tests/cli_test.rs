//! Integration tests for the `gcworklist` CLI binary.
//!
//! Argument parsing, help output, completions and error exits run without
//! a server; the end-to-end cases talk to a wiremock Grand Challenge.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "cli-token";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `gcworklist` binary with env isolation.
///
/// Clears all `GCWORKLIST_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn gcworklist_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gcworklist");
    cmd.env("HOME", "/tmp/gcworklist-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/gcworklist-cli-test-nonexistent")
        .env_remove("GCWORKLIST_PROFILE")
        .env_remove("GCWORKLIST_BASE_URL")
        .env_remove("GCWORKLIST_TOKEN")
        .env_remove("GCWORKLIST_OUTPUT")
        .env_remove("GCWORKLIST_INSECURE")
        .env_remove("GCWORKLIST_TIMEOUT")
        .env_remove("GCWORKLIST_DOWNLOAD_DIR")
        .env_remove("GCWORKLIST_USERNAME")
        .env_remove("GCWORKLIST_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A mock server that verifies `TOKEN` and publishes every schema.
async fn grand_challenge() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/v1/worklists/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "actions": {"POST": {"id": {}, "title": {}, "images": {}}}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/patients/"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"pk": "p1", "name": "Doe", "sex": "F"}])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/studies/"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"pk": "s1", "name": "CT thorax", "patient": "p1"}])),
        )
        .mount(&server)
        .await;

    server
}

/// Run the binary against `server` off the async runtime.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let uri = server.uri();
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        gcworklist_cmd()
            .args(["--base-url", &uri, "--token", TOKEN])
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = gcworklist_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    gcworklist_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("worklists")
            .and(predicate::str::contains("patients"))
            .and(predicate::str::contains("studies"))
            .and(predicate::str::contains("images")),
    );
}

#[test]
fn test_version_flag() {
    gcworklist_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gcworklist"));
}

#[test]
fn test_worklists_subcommands_exist() {
    gcworklist_cmd()
        .args(["worklists", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("add"))
                .and(predicate::str::contains("update"))
                .and(predicate::str::contains("delete")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    gcworklist_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    gcworklist_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_list_without_config_exits_general() {
    let output = gcworklist_cmd()
        .args(["worklists", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(
        text.contains("Configuration file not found"),
        "Expected missing-config diagnostic:\n{text}"
    );
}

#[test]
fn test_config_show_without_config_fails() {
    gcworklist_cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_config_path_prints_location() {
    gcworklist_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_writes_profile() {
    let home = tempfile::tempdir().unwrap();
    let init = |extra: &[&str]| {
        let mut cmd = gcworklist_cmd();
        cmd.env("XDG_CONFIG_HOME", home.path())
            .args(["--base-url", "https://gc.test", "-p", "lab", "config", "init"])
            .args(["--token-env", "LAB_TOKEN"])
            .args(extra);
        cmd.output().unwrap()
    };

    let output = init(&[]);
    assert!(output.status.success(), "{}", combined_output(&output));

    gcworklist_cmd()
        .env("XDG_CONFIG_HOME", home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("default_profile = \"lab\"")
                .and(predicate::str::contains("[profiles.lab]"))
                .and(predicate::str::contains("token_env = \"LAB_TOKEN\"")),
        );

    assert_eq!(init(&[]).status.code(), Some(2));
    assert!(init(&["--force"]).status.success());
}

#[test]
fn test_config_init_requires_base_url() {
    gcworklist_cmd()
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--base-url"));
}

#[test]
fn test_invalid_output_format() {
    let output = gcworklist_cmd()
        .args(["--output", "invalid", "worklists", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("possible values") || text.contains("invalid value"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_studies_require_patient() {
    gcworklist_cmd()
        .args(["studies", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--patient"));
}

// ── Against a mock server ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_worklists_list_as_json() {
    let server = grand_challenge().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/worklists/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "w1", "title": "Reading", "images": ["i1", "i2"]}
        ])))
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "json", "worklists", "list"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        parsed,
        json!([{"id": "w1", "title": "Reading", "images": "i1,i2"}])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_patients_hide_columns_unless_all() {
    let server = grand_challenge().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/patients/"))
        .and(query_param("worklist", "w1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"pk": "p7", "name": "Roe", "sex": "M"}])),
        )
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "plain", "patients", "list", "-w", "w1"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Roe");

    let output = run_against(
        &server,
        &["-o", "plain", "patients", "list", "-w", "w1", "--all"],
    )
    .await;
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "p7");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worklist_add_posts_title() {
    let server = grand_challenge().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/worklists/"))
        .and(body_json(json!({"title": "Second read", "images": []})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "w2"})))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, &["worklists", "add", "Second read"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Worklist created"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_delete_exits_rejected() {
    let server = grand_challenge().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/worklists/w9/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output = run_against(&server, &["-y", "worklists", "delete", "w9"]).await;
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_exits_general() {
    let server = grand_challenge().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/studies/"))
        .and(query_param("patient", "p1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let output = run_against(&server, &["studies", "list", "--patient", "p1"]).await;
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("code 500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_schema_lists_learned_columns() {
    let server = grand_challenge().await;

    let output = run_against(&server, &["-o", "json", "schema"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["worklist"], json!(["id", "title", "images"]));
    assert_eq!(parsed["patient"], json!(["name"]));
    assert_eq!(parsed["image"], json!(["pk", "name"]));

    let output = run_against(&server, &["schema", "patients", "--all"]).await;
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "pk\nname\nsex"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auth_status_rejected_token_exits_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let output = run_against(&server, &["-o", "plain", "auth", "status"]).await;
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "INVALID_CREDENTIALS"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_image_download_writes_file() {
    let server = grand_challenge().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/v1/cases/images/i1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pk": "i1",
            "name": "scan.mha",
            "files": [{"file": format!("{}/media/i1/scan.mha", server.uri())}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/i1/scan.mha"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MHA".to_vec()))
        .mount(&server)
        .await;

    let download_dir = dir.path().display().to_string();
    let output = run_against(
        &server,
        &["-q", "--download-dir", &download_dir, "images", "download", "i1"],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        std::fs::read(dir.path().join("scan.mha")).unwrap(),
        b"MHA".to_vec()
    );
}
