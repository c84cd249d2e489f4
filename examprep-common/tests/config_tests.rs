//! Tests for bootstrap configuration loading and resolution
//!
//! Covers:
//! - Missing TOML files fall back to defaults without failing
//! - Explicitly named config files must exist and parse
//! - Priority order: overrides > TOML > compiled defaults
//! - Config path resolution: CLI > EXAMPREP_CONFIG > platform default
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that touch EXAMPREP_CONFIG are marked with #[serial].

use examprep_common::config::{
    config_path_is_explicit, default_config_path, default_database_path, load_toml_config,
    parse_toml_config, resolve_config_path, ConfigOverrides, ServiceConfig, TomlConfig,
    UnknownTablePolicy, CONFIG_ENV_VAR, DEFAULT_BIND, DEFAULT_MAX_BODY_BYTES,
};
use examprep_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_defaults_when_nothing_configured() {
    let config = ServiceConfig::resolve(TomlConfig::default(), ConfigOverrides::default())
        .expect("defaults should resolve");

    assert_eq!(config.bind.to_string(), DEFAULT_BIND);
    assert_eq!(config.database_path, default_database_path());
    assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    assert_eq!(config.row_concurrency, 1);
    assert_eq!(config.unknown_tables, UnknownTablePolicy::Ignore);
    assert_eq!(config.log_level, "info");
    assert!(config.service_key.is_none());
}

#[test]
fn test_full_toml_parses() {
    let content = r#"
        database_path = "/srv/examprep/examprep.db"
        bind = "0.0.0.0:8080"
        service_key = "secret-key"
        max_body_bytes = 2048
        row_concurrency = 4
        unknown_tables = "reject"

        [logging]
        level = "debug"
    "#;

    let toml = parse_toml_config(content).expect("valid TOML");
    let config = ServiceConfig::resolve(toml, ConfigOverrides::default()).unwrap();

    assert_eq!(config.database_path, PathBuf::from("/srv/examprep/examprep.db"));
    assert_eq!(config.bind.port(), 8080);
    assert_eq!(config.service_key.as_deref(), Some("secret-key"));
    assert_eq!(config.max_body_bytes, 2048);
    assert_eq!(config.row_concurrency, 4);
    assert_eq!(config.unknown_tables, UnknownTablePolicy::Reject);
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_logging_section_without_level_defaults_to_info() {
    let toml = parse_toml_config("[logging]\n").unwrap();
    assert_eq!(toml.logging.level, "info");
}

#[test]
fn test_overrides_take_priority_over_toml() {
    let toml = TomlConfig {
        database_path: Some(PathBuf::from("/from/toml.db")),
        bind: Some("127.0.0.1:1111".to_string()),
        service_key: Some("toml-key".to_string()),
        ..Default::default()
    };
    let overrides = ConfigOverrides {
        database_path: Some(PathBuf::from("/from/cli.db")),
        bind: Some("127.0.0.1:2222".to_string()),
        service_key: Some("env-key".to_string()),
    };

    let config = ServiceConfig::resolve(toml, overrides).unwrap();

    assert_eq!(config.database_path, PathBuf::from("/from/cli.db"));
    assert_eq!(config.bind.port(), 2222);
    assert_eq!(config.service_key.as_deref(), Some("env-key"));
}

#[test]
fn test_zero_row_concurrency_rejected() {
    let toml = parse_toml_config("row_concurrency = 0").unwrap();
    let result = ServiceConfig::resolve(toml, ConfigOverrides::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = parse_toml_config("bind = [unterminated");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_missing_optional_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let config = load_toml_config(Some(&path), false).expect("missing file is not fatal");
    assert!(config.database_path.is_none());
    assert!(config.bind.is_none());
}

#[test]
fn test_missing_required_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let result = load_toml_config(Some(&path), true);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.toml");
    std::fs::write(&path, "bind = \"127.0.0.1:9999\"\nrow_concurrency = 2\n").unwrap();

    let config = load_toml_config(Some(&path), true).unwrap();
    assert_eq!(config.bind.as_deref(), Some("127.0.0.1:9999"));
    assert_eq!(config.row_concurrency, Some(2));
}

#[test]
fn test_unparsable_existing_file_is_error_even_if_optional() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.toml");
    std::fs::write(&path, "row_concurrency = \"many\"").unwrap();

    let result = load_toml_config(Some(&path), false);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_config_path_cli_beats_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/examprep-from-env.toml");

    let cli = PathBuf::from("/tmp/examprep-from-cli.toml");
    let resolved = resolve_config_path(Some(&cli));

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(cli));
}

#[test]
#[serial]
fn test_config_path_env_beats_default() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/examprep-from-env.toml");

    let resolved = resolve_config_path(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/examprep-from-env.toml")));
}

#[test]
#[serial]
fn test_config_path_falls_back_to_platform_default() {
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolve_config_path(None), default_config_path());
}

#[test]
#[serial]
fn test_blank_env_config_is_not_explicit() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = resolve_config_path(None);
    let explicit = config_path_is_explicit(None);

    env::remove_var(CONFIG_ENV_VAR);
    assert_eq!(resolved, default_config_path());
    assert!(!explicit, "blank EXAMPREP_CONFIG must not make the default file required");
}

#[test]
#[serial]
fn test_env_or_cli_config_is_explicit() {
    env::remove_var(CONFIG_ENV_VAR);
    assert!(!config_path_is_explicit(None));
    assert!(config_path_is_explicit(Some(&PathBuf::from("/tmp/examprep.toml"))));

    env::set_var(CONFIG_ENV_VAR, "/tmp/examprep-from-env.toml");
    let explicit = config_path_is_explicit(None);
    env::remove_var(CONFIG_ENV_VAR);
    assert!(explicit);
}
