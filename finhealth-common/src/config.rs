//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unparsable TOML file never aborts startup: it is logged and
//! the remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_FILE: &str = "FINHEALTH_CONFIG";
/// Environment variable overriding the API base URL
pub const ENV_API_URL: &str = "FINHEALTH_API_URL";
/// Environment variable overriding the consent poll interval (milliseconds)
pub const ENV_POLL_INTERVAL_MS: &str = "FINHEALTH_POLL_INTERVAL_MS";
/// Environment variable overriding the session persistence policy
pub const ENV_SESSION_POLICY: &str = "FINHEALTH_SESSION_POLICY";
/// Environment variable overriding the session file location
pub const ENV_SESSION_FILE: &str = "FINHEALTH_SESSION_FILE";
/// Environment variable overriding the report output directory
pub const ENV_REPORT_DIR: &str = "FINHEALTH_REPORT_DIR";

/// How a session credential survives across client restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// Written to disk on login, restored on start, removed on logout
    #[default]
    Persistent,
    /// Held in memory only; gone when the process exits
    ProcessScoped,
    /// Held in memory only; a leftover session file is removed on start
    AlwaysLogin,
}

impl FromStr for SessionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "persistent" => Ok(SessionPolicy::Persistent),
            "process-scoped" | "process" => Ok(SessionPolicy::ProcessScoped),
            "always-login" | "never-restore" => Ok(SessionPolicy::AlwaysLogin),
            other => Err(Error::Config(format!("Unknown session policy: {}", other))),
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// On-disk TOML configuration; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub session_policy: Option<SessionPolicy>,
    pub session_file: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled-in fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub session_file: PathBuf,
    pub report_dir: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join("finhealth"))
            .unwrap_or_else(|| PathBuf::from("./finhealth_data"));
        let report_dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            poll_interval: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(30),
            session_file: data_dir.join("session.json"),
            report_dir,
            log_level: "info".to_string(),
        }
    }
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub session_policy: SessionPolicy,
    pub session_file: PathBuf,
    pub report_dir: PathBuf,
    pub log_level: String,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub session_policy: Option<SessionPolicy>,
    pub session_file: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
}

/// Locate the TOML config file
///
/// `FINHEALTH_CONFIG` wins; otherwise `<config_dir>/finhealth/config.toml`.
/// Returns `None` when no file exists.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file: {}", ENV_CONFIG_FILE, path.display());
        return None;
    }

    dirs::config_dir()
        .map(|d| d.join("finhealth").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Resolves a [`ClientConfig`] from CLI overrides, environment, TOML and defaults
pub struct ConfigResolver {
    overrides: ConfigOverrides,
    toml: TomlConfig,
    defaults: CompiledDefaults,
}

impl ConfigResolver {
    /// Build a resolver, loading the TOML file from the standard location
    ///
    /// TOML problems degrade to defaults with a warning.
    pub fn new(overrides: ConfigOverrides) -> Self {
        let toml = match config_file_path() {
            Some(path) => match load_toml_config(&path) {
                Ok(cfg) => {
                    debug!("Loaded config from {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };
        Self::with_toml(overrides, toml)
    }

    /// Build a resolver from an already-loaded TOML config
    pub fn with_toml(overrides: ConfigOverrides, toml: TomlConfig) -> Self {
        Self {
            overrides,
            toml,
            defaults: CompiledDefaults::for_current_platform(),
        }
    }

    /// Resolve and validate the final configuration
    pub fn resolve(self) -> Result<ClientConfig> {
        let api_base_url = self
            .overrides
            .api_base_url
            .or_else(|| std::env::var(ENV_API_URL).ok())
            .or(self.toml.api_base_url)
            .unwrap_or(self.defaults.api_base_url);
        let api_base_url = normalize_base_url(&api_base_url)?;

        let poll_interval_ms = self
            .overrides
            .poll_interval_ms
            .or_else(|| env_parse::<u64>(ENV_POLL_INTERVAL_MS))
            .or(self.toml.poll_interval_ms);
        let poll_interval = match poll_interval_ms {
            Some(0) => {
                return Err(Error::Config(
                    "poll_interval_ms must be greater than zero".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => self.defaults.poll_interval,
        };

        let request_timeout = self
            .toml
            .request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.defaults.request_timeout);

        let session_policy = match self.overrides.session_policy {
            Some(policy) => policy,
            None => match std::env::var(ENV_SESSION_POLICY) {
                Ok(raw) => raw.parse()?,
                Err(_) => self.toml.session_policy.unwrap_or_default(),
            },
        };

        let session_file = self
            .overrides
            .session_file
            .or_else(|| std::env::var(ENV_SESSION_FILE).ok().map(PathBuf::from))
            .or(self.toml.session_file)
            .unwrap_or(self.defaults.session_file);

        let report_dir = self
            .overrides
            .report_dir
            .or_else(|| std::env::var(ENV_REPORT_DIR).ok().map(PathBuf::from))
            .or(self.toml.report_dir)
            .unwrap_or(self.defaults.report_dir);

        Ok(ClientConfig {
            api_base_url,
            poll_interval,
            request_timeout,
            session_policy,
            session_file,
            report_dir,
            log_level: self.toml.logging.level,
        })
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={}", name, raw);
            None
        }
    }
}

/// Check scheme and strip trailing slashes so paths can be appended
///
/// # Examples
///
/// ```
/// use finhealth_common::config::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/api/").unwrap(), "http://localhost:8000/api");
/// assert!(normalize_base_url("localhost:8000").is_err());
/// ```
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "API base URL must start with http:// or https://: {}",
            raw
        )));
    }
    Ok(trimmed.to_string())
}
