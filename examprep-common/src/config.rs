//! Bootstrap configuration for exam-prep services
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment values arrive together as [`ConfigOverrides`]
//! (the binary's argument parser reads both); the TOML file is located with
//! [`resolve_config_path`] and parsed with [`load_toml_config`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "EXAMPREP_CONFIG";

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:5790";

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default number of rows of one table upserted at the same time
pub const DEFAULT_ROW_CONCURRENCY: usize = 1;

/// What to do with table names the importer does not recognize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTablePolicy {
    /// Skip unknown tables without reporting them
    #[default]
    Ignore,
    /// Fail validation when an unknown table is present
    Reject,
}

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; anything missing falls back to a compiled default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind address, e.g. "0.0.0.0:5790"
    #[serde(default)]
    pub bind: Option<String>,

    /// Service key required by the import endpoint (unset disables auth)
    #[serde(default)]
    pub service_key: Option<String>,

    /// Maximum accepted request body in bytes
    #[serde(default)]
    pub max_body_bytes: Option<usize>,

    /// Rows of the same table upserted concurrently
    #[serde(default)]
    pub row_concurrency: Option<usize>,

    /// Policy for unrecognized table names in import payloads
    #[serde(default)]
    pub unknown_tables: Option<UnknownTablePolicy>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub service_key: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub bind: SocketAddr,
    pub service_key: Option<String>,
    pub max_body_bytes: usize,
    pub row_concurrency: usize,
    pub unknown_tables: UnknownTablePolicy,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(toml: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let database_path = overrides
            .database_path
            .or(toml.database_path)
            .unwrap_or_else(default_database_path);

        let bind_str = overrides
            .bind
            .or(toml.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_str, e)))?;

        let service_key = overrides
            .service_key
            .or(toml.service_key)
            .filter(|key| !key.trim().is_empty());

        let row_concurrency = toml.row_concurrency.unwrap_or(DEFAULT_ROW_CONCURRENCY);
        if row_concurrency == 0 {
            return Err(Error::Config(
                "row_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_path,
            bind,
            service_key,
            max_body_bytes: toml.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            row_concurrency,
            unknown_tables: toml.unknown_tables.unwrap_or_default(),
            log_level: toml.logging.level,
        })
    }
}

/// Locate the TOML config file
///
/// Priority: command-line path, then `EXAMPREP_CONFIG`, then the platform
/// config directory. Returns `None` only when no platform config directory
/// can be determined.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    env_config_path().or_else(default_config_path)
}

/// Path named by `EXAMPREP_CONFIG`, ignoring a blank value
pub fn env_config_path() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

/// Whether the config file was named by the user (CLI or environment)
///
/// A named file must exist; the platform default may be missing.
pub fn config_path_is_explicit(cli_arg: Option<&Path>) -> bool {
    cli_arg.is_some() || env_config_path().is_some()
}

/// Platform config file location: `<config_dir>/examprep/import.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("examprep").join("import.toml"))
}

/// Platform database location: `<data_local_dir>/examprep/examprep.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("examprep"))
        .unwrap_or_else(|| PathBuf::from("./examprep_data"))
        .join("examprep.db")
}

/// Parse TOML config content
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. When `required` is set (the path was named explicitly) the file
/// must exist. Unreadable or unparsable files are always errors.
pub fn load_toml_config(path: Option<&Path>, required: bool) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config directory available, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_table_policy_parses_lowercase() {
        let config = parse_toml_config("unknown_tables = \"reject\"").unwrap();
        assert_eq!(config.unknown_tables, Some(UnknownTablePolicy::Reject));
    }

    #[test]
    fn test_blank_service_key_disables_auth() {
        let overrides = ConfigOverrides {
            service_key: Some("   ".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(TomlConfig::default(), overrides).unwrap();
        assert!(config.service_key.is_none());
    }

    #[test]
    fn test_invalid_bind_is_config_error() {
        let toml = TomlConfig {
            bind: Some("not-an-address".to_string()),
            ..Default::default()
        };
        let err = ServiceConfig::resolve(toml, ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
