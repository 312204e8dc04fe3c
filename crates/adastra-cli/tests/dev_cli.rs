//! Integration tests for `adastra dev` startup failures.
//!
//! A full dev loop needs store credentials; these cover what happens before
//! and at the first authentication.

use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "adastra-cli", "--bin", "adastra", "--"]);
    cmd.env_remove("SHOPIFY_FLAG_STORE")
        .env_remove("SHOPIFY_CLI_THEME_TOKEN")
        .env_remove("NODE_ENV");
    cmd
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn test_dev_requires_store() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["dev", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run dev command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No store given"));
    assert!(!dir.path().join("snippets").exists());
}

#[test]
fn test_dev_without_password_fails_after_writing_snippet() {
    let dir = tempdir().unwrap();
    let port = free_port().to_string();

    let output = cargo_bin()
        .args(["dev", "--store", "my-shop", "--asset-port", &port, "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run dev command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Authentication failed for my-shop"));

    let snippet =
        std::fs::read_to_string(dir.path().join("snippets/adastra-tag.liquid")).unwrap();
    assert!(snippet.contains(&format!("'http://localhost:{port}/src/entrypoints/'")));
}

#[test]
fn test_dev_reads_store_from_env_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".env.staging"), "SHOPIFY_FLAG_STORE=staging-shop\n").unwrap();
    let port = free_port().to_string();

    let output = cargo_bin()
        .args(["dev", "--mode", "staging", "--asset-port", &port, "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run dev command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("staging-shop"));
}
