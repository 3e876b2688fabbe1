//! Integration tests for dmc

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use dmc_manifest::test_support::{plugin_upload, PluginArchiveBuilder};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

/// Isolated config: storage under `dir`, and a runtime binary that does not exist
fn write_config(dir: &Path) -> PathBuf {
    let config_path = dir.join("dmc.toml");
    let storage = dir.join("storage");
    let contents = format!(
        "storage-path = \"{}\"\nruntime-path = \"{}\"\nruntime-timeout-secs = 5\n",
        storage.display(),
        dir.join("no-such-runtime").display()
    );
    if let Err(err) = fs::write(&config_path, contents) {
        panic!("failed to write config: {err}");
    }
    config_path
}

fn dmc_cmd(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("dmc");
    cmd.env("DMC_CONFIG", write_config(dir));
    cmd
}

fn write_archive(dir: &Path, file_name: &str, bytes: Vec<u8>) -> PathBuf {
    let path = dir.join(file_name);
    if let Err(err) = fs::write(&path, bytes) {
        panic!("failed to write archive: {err}");
    }
    path
}

#[test]
fn test_version() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dmc"));
}

#[test]
fn test_help() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("one game-server workload per tenant"));
}

#[test]
fn test_invalid_command() {
    let dir = temp_dir();
    dmc_cmd(dir.path()).arg("invalid").assert().failure();
}

#[test]
fn test_config_show() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"))
        .stdout(predicate::str::contains("runtime-timeout-secs"));
}

#[test]
fn test_config_path_honors_env() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dmc.toml"));
}

#[test]
fn test_stop_unknown_tenant_is_not_found() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .args(["stop", "0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"kind\": \"not_found\""));
}

#[test]
fn test_stop_rejects_malformed_tenant() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .args(["stop", "../../etc"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\": \"invalid_tenant\""));
}

#[test]
fn test_create_unsatisfied_dependency_fails_before_storage() {
    let dir = temp_dir();
    let core = plugin_upload("Core", "1.0", &["Lib"], &[]);
    let plugin = write_archive(dir.path(), "Core.jar", core.into_bytes());

    dmc_cmd(dir.path())
        .arg("create")
        .arg("--plugin")
        .arg(&plugin)
        .assert()
        .failure()
        .stdout(predicate::str::contains("unsatisfied_hard_dependency"))
        .stdout(predicate::str::contains("\"required\": 1"))
        .stdout(predicate::str::contains("\"found\": 0"))
        .stdout(predicate::str::contains("Lib"));

    assert!(!dir.path().join("storage").exists());
}

#[test]
fn test_create_primary_without_manifest_fails() {
    let dir = temp_dir();
    let bytes = PluginArchiveBuilder::new()
        .entry("com/example/Main.class", b"\xca\xfe\xba\xbe")
        .build();
    let plugin = write_archive(dir.path(), "NoManifest.jar", bytes);

    dmc_cmd(dir.path())
        .args(["create", "--plugin"])
        .arg(&plugin)
        .assert()
        .failure()
        .stdout(predicate::str::contains("manifest_not_found"));
}

#[test]
fn test_create_without_runtime_reports_runtime_error() {
    let dir = temp_dir();
    let essentials = plugin_upload("Essentials", "2.1", &[], &[]);
    let plugin = write_archive(dir.path(), "Essentials.jar", essentials.into_bytes());
    let tenant = "0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11";

    dmc_cmd(dir.path())
        .args(["create", "--tenant", tenant, "--plugin"])
        .arg(&plugin)
        .assert()
        .failure()
        .stdout(predicate::str::contains("runtime_error"));

    // The runtime never held a workload, so the tenant root is reclaimed
    assert!(dir.path().join("storage").is_dir());
    assert!(!dir.path().join("storage").join(tenant).exists());

    dmc_cmd(dir.path())
        .args(["stop", tenant])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\": \"not_found\""));
}

#[test]
fn test_create_missing_file_is_io_error() {
    let dir = temp_dir();
    dmc_cmd(dir.path())
        .args(["create", "--plugin", "/nonexistent/dmc/Core.jar"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("io_error"));
}
