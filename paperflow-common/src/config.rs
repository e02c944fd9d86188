//! Configuration loading and setting resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! A missing TOML file is not an error: the tools log a warning and continue
//! with defaults. A file that exists but cannot be read or parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PAPERFLOW_CONFIG";

/// Default Zotero Web API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.zotero.org";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Zotero account settings
    #[serde(default)]
    pub zotero: ZoteroConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Duplicate merge stage defaults
    #[serde(default)]
    pub dedupe: DedupeStageConfig,
}

/// Zotero account settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ZoteroConfig {
    /// Numeric user library id
    #[serde(default)]
    pub user_id: Option<String>,

    /// Web API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL override (tests, proxies)
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Duplicate merge stage defaults
///
/// Every field can be overridden from the command line.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupeStageConfig {
    /// Collection key limiting the scan
    #[serde(default)]
    pub collection: Option<String>,

    /// Collection name, resolved to a key at startup
    #[serde(default)]
    pub collection_name: Option<String>,

    /// Only consider items carrying this tag
    #[serde(default)]
    pub tag: Option<String>,

    /// Max number of top-level items to scan (<= 0 means no limit)
    #[serde(default)]
    pub limit: i64,

    /// Grouping heuristic (auto, doi, url, title)
    #[serde(default = "default_group_by")]
    pub group_by: String,

    /// Preview actions without modifying the library
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DedupeStageConfig {
    fn default() -> Self {
        Self {
            collection: None,
            collection_name: None,
            tag: None,
            limit: 0,
            group_by: default_group_by(),
            dry_run: false,
        }
    }
}

fn default_group_by() -> String {
    "auto".to_string()
}

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    CommandLine,
    Environment,
    TomlFile,
}

impl std::fmt::Display for SettingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingSource::CommandLine => write!(f, "command line"),
            SettingSource::Environment => write!(f, "environment"),
            SettingSource::TomlFile => write!(f, "TOML config"),
        }
    }
}

/// Validate a setting value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve one string setting: CLI → ENV → TOML
///
/// Blank values at any tier are skipped rather than shadowing lower tiers.
pub fn resolve_setting(
    cli_value: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<(String, SettingSource)> {
    if let Some(value) = cli_value.filter(|v| is_valid_value(v)) {
        return Some((value.trim().to_string(), SettingSource::CommandLine));
    }

    if let Ok(value) = std::env::var(env_var_name) {
        if is_valid_value(&value) {
            return Some((value.trim().to_string(), SettingSource::Environment));
        }
    }

    toml_value
        .filter(|v| is_valid_value(v))
        .map(|v| (v.trim().to_string(), SettingSource::TomlFile))
}

/// Locate the config file: explicit path → `PAPERFLOW_CONFIG` → platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if is_valid_value(&path) {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Platform config location, e.g. `~/.config/paperflow/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperflow").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from this file
    File(PathBuf),
    /// Path resolved but nothing there; defaults used
    MissingFile(PathBuf),
    /// No explicit path and no platform config directory; defaults used
    NoConfigDir,
}

impl ConfigOrigin {
    pub fn is_default(&self) -> bool {
        !matches!(self, ConfigOrigin::File(_))
    }

    /// Report the origin; call once the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(p) => debug!(path = %p.display(), "Loaded TOML config"),
            ConfigOrigin::MissingFile(p) => {
                warn!(path = %p.display(), "Config file not found, using defaults")
            }
            ConfigOrigin::NoConfigDir => warn!("No config directory available, using defaults"),
        }
    }
}

/// Configuration plus its origin
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub origin: ConfigOrigin,
}

/// Load the config file if present, defaults otherwise
///
/// Nothing is logged here: logging is configured from the result, so the
/// caller reports [`LoadedConfig::origin`] after installing the subscriber.
pub fn load_or_default(path: Option<&Path>) -> Result<LoadedConfig> {
    match path {
        Some(p) if p.exists() => Ok(LoadedConfig {
            config: load_toml_config(p)?,
            origin: ConfigOrigin::File(p.to_path_buf()),
        }),
        Some(p) => Ok(LoadedConfig {
            config: TomlConfig::default(),
            origin: ConfigOrigin::MissingFile(p.to_path_buf()),
        }),
        None => Ok(LoadedConfig {
            config: TomlConfig::default(),
            origin: ConfigOrigin::NoConfigDir,
        }),
    }
}
