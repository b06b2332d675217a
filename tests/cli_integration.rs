use std::fs;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::TempDir;

fn proxy(cache: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("caching-proxy");
    cmd.env("CACHING_PROXY_CACHE_DIR", cache.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_displays() {
    let cache = TempDir::new().unwrap();
    proxy(&cache)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--origin"))
        .stdout(predicate::str::contains("--clear-cache"));
}

#[test]
fn clear_cache_empties_the_directory() {
    let cache = TempDir::new().unwrap();
    fs::write(cache.path().join("deadbeef.json"), b"{}").unwrap();
    fs::write(cache.path().join("cafebabe.json"), b"{}").unwrap();

    proxy(&cache)
        .arg("--clear-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache cleared."));

    assert!(cache.path().is_dir());
    assert_eq!(fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[test]
fn clear_cache_via_flag_overrides_env() {
    let env_dir = TempDir::new().unwrap();
    let flag_dir = TempDir::new().unwrap();
    fs::write(env_dir.path().join("keep.json"), b"{}").unwrap();
    fs::write(flag_dir.path().join("drop.json"), b"{}").unwrap();

    proxy(&env_dir)
        .arg("--clear-cache")
        .arg("--cache-dir")
        .arg(flag_dir.path())
        .assert()
        .success();

    assert!(env_dir.path().join("keep.json").exists());
    assert_eq!(fs::read_dir(flag_dir.path()).unwrap().count(), 0);
}

#[test]
fn missing_arguments_is_a_usage_error() {
    let cache = TempDir::new().unwrap();
    proxy(&cache)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn port_without_origin_is_a_usage_error() {
    let cache = TempDir::new().unwrap();
    proxy(&cache)
        .args(["--port", "3000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--origin"));
}

#[test]
fn invalid_origin_is_a_usage_error() {
    let cache = TempDir::new().unwrap();
    proxy(&cache)
        .args(["--port", "3000", "--origin", "ftp://example.com"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("http/https"));
}

#[test]
fn zero_timeout_is_rejected() {
    let cache = TempDir::new().unwrap();
    proxy(&cache)
        .args(["--port", "3000", "--origin", "http://example.com", "--timeout", "0"])
        .assert()
        .code(2);
}
