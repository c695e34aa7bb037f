#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the `kianda` binary against a mock backend.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

/// Run `kianda` with an isolated credential file and backend.
fn run_kianda(base_url: &str, credentials: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kianda"))
        .args(args)
        .env("KIANDA__API__BASE_URL", base_url)
        .env("KIANDA__CREDENTIALS__PATH", credentials)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute kianda")
}

fn write_session(path: &Path, access: &str, refresh: &str) {
    let doc = json!({"access_token": access, "refresh_token": refresh});
    std::fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
}

#[test]
fn test_cli_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_kianda"))
        .arg("--help")
        .output()
        .expect("Failed to execute kianda");

    assert!(output.status.success(), "Help command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "Should contain usage information");
    for command in ["login", "logout", "whoami", "request", "status"] {
        assert!(stdout.contains(command), "Should list '{command}'");
    }
}

#[test]
fn test_print_config_reflects_env_override() {
    let dir = TempDir::new().unwrap();
    let output = run_kianda(
        "https://portal.example.com",
        &dir.path().join("credentials.json"),
        &["--print-config"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("https://portal.example.com"), "{stdout}");
    assert!(stdout.contains("/api/auth/refresh/"), "{stdout}");
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_kianda(
        "http://localhost:8000",
        &dir.path().join("credentials.json"),
        &["--config", "/nonexistent/kianda.yaml", "status"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config file does not exist"), "{stderr}");
}

#[test]
fn test_login_then_status_and_whoami() {
    let server = MockServer::start();
    let _csrf = server.mock(|when, then| {
        when.method(GET).path("/api/auth/csrf/");
        then.status(200).json_body(json!({"csrfToken": "CSRF1"}));
    });
    let _login = server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/login/")
            .header("x-csrftoken", "CSRF1");
        then.status(200).json_body(json!({
            "access": "T1",
            "refresh": "R1",
            "user": {"id": 5, "role": "student", "first_name": "Amina"}
        }));
    });
    let _user = server.mock(|when, then| {
        when.method(GET)
            .path("/api/auth/user/")
            .header("authorization", "Bearer T1");
        then.status(200)
            .json_body(json!({"id": 5, "role": "student", "email": "amina@school.test"}));
    });

    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    let base = server.base_url();

    let output = run_kianda(
        &base,
        &credentials,
        &["login", "--email", "amina@school.test", "--password", "pw"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Amina"), "{stdout}");
    assert!(stdout.contains("/dashboard"), "{stdout}");

    let output = run_kianda(&base, &credentials, &["status"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Session: stored"));

    let output = run_kianda(&base, &credentials, &["whoami"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("amina@school.test"));
}

#[test]
fn test_expired_session_asks_for_login() {
    let server = MockServer::start();
    let _students = server.mock(|when, then| {
        when.method(GET).path("/api/students/");
        then.status(401);
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/refresh/")
            .json_body(json!({"refresh": "R1"}));
        then.status(401).json_body(json!({"detail": "Token is invalid or expired"}));
    });

    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    write_session(&credentials, "T1", "R1");

    let output = run_kianda(
        &server.base_url(),
        &credentials,
        &["request", "GET", "/api/students/"],
    );

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("kianda login"), "{stderr}");
    refresh.assert_calls(1);

    let output = run_kianda(&server.base_url(), &credentials, &["status"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Session: none"));
}

#[test]
fn test_request_prints_json_body() {
    let server = MockServer::start();
    let _create = server.mock(|when, then| {
        when.method(POST)
            .path("/api/courses/")
            .header("authorization", "Bearer T1")
            .json_body(json!({"name": "Biology"}));
        then.status(201).json_body(json!({"id": 12, "name": "Biology"}));
    });

    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    write_session(&credentials, "T1", "R1");

    let output = run_kianda(
        &server.base_url(),
        &credentials,
        &["request", "post", "/api/courses/", "--data", r#"{"name":"Biology"}"#],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["id"], 12);
}
