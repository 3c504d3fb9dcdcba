//! Smoke tests for the `cxs` binary.
//!
//! Each test writes a config into a temp directory pointing the SQLite
//! backend at a fresh database. Providers are disabled, so nothing here
//! touches the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cxs_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("cxs");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/cxs.sqlite"

[index]
backend = "sqlite"
index_name = "handbook"

[logging]
default = "warn"
{}
"#,
        root.display(),
        extra
    );
    let config_path = root.join("config").join("cxs.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_cxs(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(cxs_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cxs: {}", e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(cxs_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["init", "process", "search", "completions"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_completions_do_not_need_config() {
    let output = Command::new(cxs_binary())
        .args(["--config", "/nonexistent/cxs.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cxs"));
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env("");
    let (stdout, stderr, success) = run_cxs(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Index 'handbook' ready"));
    assert!(tmp.path().join("data").join("cxs.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env("");
    assert!(run_cxs(&config, &["init"]).2);
    assert!(run_cxs(&config, &["init"]).2);
    let (_, stderr, success) = run_cxs(&config, &["init", "--recreate"]);
    assert!(success, "init --recreate failed: {}", stderr);
}

#[test]
fn test_search_failure_prints_no_results() {
    let (_tmp, config) = setup_test_env("");
    assert!(run_cxs(&config, &["init"]).2);

    // The disabled embedder cannot encode the query.
    let (stdout, stderr, success) = run_cxs(&config, &["search", "vacation policy"]);
    assert!(success);
    assert!(stdout.contains("No results."));
    assert!(stderr.contains("Error:"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, success) = run_cxs(&config, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_process_missing_file_fails() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, success) = run_cxs(&config, &["process", "/nonexistent/handbook.pdf"]);
    assert!(!success);
    assert!(stderr.contains("Failed to extract text"));
}

#[test]
fn test_process_empty_document_fails() {
    let (tmp, config) = setup_test_env("");
    let doc = tmp.path().join("empty.txt");
    fs::write(&doc, "  \n\n ").unwrap();

    let (_, stderr, success) = run_cxs(&config, &["process", doc.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("document text is empty"));
}

#[test]
fn test_process_with_disabled_llm_fails() {
    let (tmp, config) = setup_test_env("");
    let doc = tmp.path().join("handbook.md");
    fs::write(&doc, "# Handbook\n\nEmployees accrue vacation days monthly.\n").unwrap();

    let (_, stderr, success) = run_cxs(&config, &["process", doc.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("error generating context"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_test_env("[chunking]\nchunk_size = 100\noverlap = 100\n");
    let (_, stderr, success) = run_cxs(&config, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}

#[test]
fn test_missing_config_fails() {
    let output = Command::new(cxs_binary())
        .args(["--config", "/nonexistent/cxs.toml", "init"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}
