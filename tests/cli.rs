mod common;

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn run_vlmds(db_path: &Path, extra_env: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_vlmds");
    let db_url = format!("sqlite://{}", db_path.display());
    let mut cmd = Command::new(binary);
    cmd.env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("RUST_LOG", "warn")
        .env("DATABASE_URL", &db_url)
        .current_dir(db_path.parent().unwrap());
    for (k, v) in common::BASE_ENV.iter().chain(extra_env.iter()) {
        cmd.env(k, v);
    }
    let output = cmd
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vlmds at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data").join("datasets.sqlite");

    let (stdout, stderr, ok) = run_vlmds(&db_path, &[], &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(db_path.exists());

    // idempotent
    let (_, stderr, ok) = run_vlmds(&db_path, &[], &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_list_on_empty_database() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("datasets.sqlite");

    let (stdout, stderr, ok) = run_vlmds(&db_path, &[], &["list"]);
    assert!(ok, "list failed: {}", stderr);
    assert!(stdout.contains("No datasets."));
}

#[test]
fn test_show_unknown_dataset_fails() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("datasets.sqlite");

    let (_, stderr, ok) = run_vlmds(&db_path, &[], &["show", "does-not-exist"]);
    assert!(!ok);
    assert!(stderr.contains("dataset does-not-exist not found"), "{}", stderr);
}

#[test]
fn test_presign_prints_signed_url() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("datasets.sqlite");

    let (stdout, stderr, ok) = run_vlmds(
        &db_path,
        &[],
        &["presign", "datasets/x/raw/a.pdf", "--method", "put", "--ttl", "60"],
    );
    assert!(ok, "presign failed: {}", stderr);
    let url = stdout.trim();
    assert!(url.starts_with("http://127.0.0.1:9/datasets/datasets/x/raw/a.pdf?"));
    assert!(url.contains("X-Amz-Expires=60"));
    assert!(url.contains("X-Amz-Signature="));
}

#[test]
fn test_invalid_configuration_lists_every_problem() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("datasets.sqlite");

    let (_, stderr, ok) = run_vlmds(
        &db_path,
        &[("S3_ENDPOINT", "nope"), ("S3_BUCKET", ""), ("APP_ENV", "staging")],
        &["list"],
    );
    assert!(!ok);
    assert!(stderr.contains("Invalid configuration:"), "{}", stderr);
    assert!(stderr.contains("S3_ENDPOINT"));
    assert!(stderr.contains("S3_BUCKET: required"));
    assert!(stderr.contains("APP_ENV"));
}
