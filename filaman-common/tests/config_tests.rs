//! Integration tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Priority order for config file resolution (CLI > env > user file > defaults)
//! - Missing config files produce defaults instead of failing startup
//! - Invalid files are reported as errors
//!
//! Tests that touch FILAMAN_CONFIG are marked #[serial] so they never race on
//! the process environment.

use filaman_common::config::{
    default_config_path, resolve_config_path, ClientConfig, CONFIG_ENV_VAR,
};
use filaman_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// CLI argument wins over the environment variable
#[test]
#[serial]
fn test_cli_argument_has_priority() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/filaman-from-env.toml");

    let cli = PathBuf::from("/tmp/filaman-from-cli.toml");
    let resolved = resolve_config_path(Some(&cli));

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(cli));
}

/// Environment variable is used when no CLI argument is given
#[test]
#[serial]
fn test_env_var_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/filaman-from-env.toml");

    let resolved = resolve_config_path(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/filaman-from-env.toml")));
}

/// Without CLI or env, only an existing per-user file is returned
#[test]
#[serial]
fn test_user_file_only_when_present() {
    env::remove_var(CONFIG_ENV_VAR);

    let resolved = resolve_config_path(None);
    let expected = default_config_path().filter(|p| p.exists());
    assert_eq!(resolved, expected);
}

/// A config file that does not exist falls back to compiled defaults
#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let config = ClientConfig::load(Some(&missing)).unwrap();
    assert_eq!(config, ClientConfig::default());
}

/// A config file named through the environment is loaded
#[test]
#[serial]
fn test_load_from_env_file() {
    let file = write_config(
        r#"
        device_url = "https://filaman.example.net"

        [link]
        poll_enabled = false

        [catalog]
        spoolman_url = "http://spoolman.local:7912"
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let result = ClientConfig::load(None);

    env::remove_var(CONFIG_ENV_VAR);
    let config = result.unwrap();
    assert_eq!(config.device_url, "https://filaman.example.net");
    assert!(!config.link.poll_enabled);
    assert_eq!(
        config.catalog.spoolman_url.as_deref(),
        Some("http://spoolman.local:7912")
    );
    assert_eq!(
        config.device_endpoints().unwrap().websocket.as_str(),
        "wss://filaman.example.net/ws"
    );
}

/// A file that exists but does not parse is an error, not a silent default
#[test]
#[serial]
fn test_unparseable_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config("[link\nprobe_interval_ms = 1");

    let result = ClientConfig::load(Some(file.path()));
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

/// A file that parses but violates validation is an error
#[test]
#[serial]
fn test_invalid_values_rejected() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config("[link]\nliveness_timeout_ms = 0\n");

    let result = ClientConfig::load(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}
