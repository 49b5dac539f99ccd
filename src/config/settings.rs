//! TOML-based configuration for quarry.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! timeout = "10s"
//! max_concurrency = 100
//! max_pending = 1000
//! rejection = "block"
//!
//! [sql]
//! dialect = "postgres"
//! max_page_size = 100
//!
//! [search]
//! page_size = 2000
//! scroll = "1m"
//!
//! [cubes.mysql_index_stats]
//! backend = "sql"
//! table = "${STATS_SCHEMA}.innodb_index_stats"
//! dimensions = [{ code = "database_name", column = "database_name", alias = "db" }]
//! measures = [{ code = "stat_value", columns = [{ column = "stat_value", alias = "statValue" }] }]
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::cubes::CubeDefinition;
use crate::engine::{
    RejectionPolicy, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_PENDING, DEFAULT_SEPARATOR,
};
use crate::sql::{Dialect, MAX_PAGE_SIZE};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "QUARRY_CONFIG";

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(ms|s|m|h)\s*$").unwrap());

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Cube not found: {0}")]
    CubeNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub sql: SqlSettings,
    pub search: SearchSettings,
    /// Cube definitions keyed by cube name.
    pub cubes: BTreeMap<String, CubeDefinition>,
}

/// Batch engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Wait per batch member (e.g., "10s", "500ms").
    pub timeout: String,

    /// Batch members running at once.
    pub max_concurrency: usize,

    /// Batch members queued or running before the rejection policy applies.
    pub max_pending: usize,

    pub rejection: RejectionPolicy,

    /// Joins dimension values into merge keys.
    pub merge_key_separator: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_pending: DEFAULT_MAX_PENDING,
            rejection: RejectionPolicy::Block,
            merge_key_separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn timeout_duration(&self) -> Result<Duration, SettingsError> {
        parse_duration(&self.timeout)
    }
}

/// Relational backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SqlSettings {
    pub dialect: Dialect,

    /// Upper bound for requested page sizes.
    pub max_page_size: u64,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Hits per scroll page on flat queries.
    pub page_size: u64,

    /// Scroll cursor keep-alive (e.g., "1m").
    pub scroll: String,

    /// Buckets per `terms` aggregation.
    pub terms_size: u64,

    /// Time zone of date histograms.
    pub time_zone: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_size: 2000,
            scroll: "1m".to_string(),
            terms_size: 1000,
            time_zone: "UTC".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.engine.timeout_duration()?;
        parse_duration(&settings.search.scroll)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    /// 3. `~/.config/quarry/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a cube definition by name.
    pub fn cube(&self, name: &str) -> Result<&CubeDefinition, SettingsError> {
        self.cubes
            .get(name)
            .ok_or_else(|| SettingsError::CubeNotFound(name.to_string()))
    }
}

/// Parse a duration such as `500ms`, `10s`, `1m` or `2h`.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let caps = DURATION_RE
        .captures(s)
        .ok_or_else(|| SettingsError::InvalidDuration(s.to_string()))?;
    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| SettingsError::InvalidDuration(s.to_string()))?;
    let duration = match &caps[2] {
        "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount * 60),
        _ => Duration::from_secs(amount * 3600),
    };
    Ok(duration)
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
