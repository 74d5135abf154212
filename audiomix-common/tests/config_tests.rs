//! Tests for config file resolution and graceful degradation
//!
//! Covers:
//! - Priority order: command line, then environment, then per-user file
//! - Missing config files fall back to defaults without failing
//! - Malformed config files are reported
//!
//! Note: Tests that manipulate AUDIOMIX_CONFIG are marked with #[serial]
//! so they never race on the process environment.

use audiomix_common::config::{
    load_or_default, resolve_config_path, ConfigOrigin, CONFIG_ENV_VAR,
};
use audiomix_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, PartialEq)]
struct TestConfig {
    #[serde(default)]
    level: String,
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.toml");
    env::set_var(CONFIG_ENV_VAR, &path);

    let (resolved, origin) = resolve_config_path(None, CONFIG_ENV_VAR, "audiomix-test").unwrap();
    assert_eq!(resolved, path);
    assert_eq!(origin, ConfigOrigin::Environment);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let cli = PathBuf::from("/tmp/from-cli.toml");

    let (resolved, origin) =
        resolve_config_path(Some(&cli), CONFIG_ENV_VAR, "audiomix-test").unwrap();
    assert_eq!(resolved, cli);
    assert_eq!(origin, ConfigOrigin::CommandLine);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR, "audiomix-test-no-such-app");
    assert!(resolved.is_none());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_from_env_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "level = \"debug\"\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let config: TestConfig = load_or_default(None, CONFIG_ENV_VAR, "audiomix-test").unwrap();
    assert_eq!(config.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_env_file_uses_defaults() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/audiomix/config.toml");

    let config: TestConfig = load_or_default(None, CONFIG_ENV_VAR, "audiomix-test").unwrap();
    assert_eq!(config, TestConfig::default());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_malformed_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "level = [unclosed").unwrap();

    let result: Result<TestConfig, Error> =
        load_or_default(Some(&path), CONFIG_ENV_VAR, "audiomix-test");
    assert!(matches!(result, Err(Error::Config(_))));
}
