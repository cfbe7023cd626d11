//! Configuration loading for the console.
//! Reads hmsconsole.toml from the current directory or the path in HMSCONSOLE_CONFIG.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "hmsconsole.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_bind()       -> String  { "0.0.0.0:3000".to_string() }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), static_dir: default_static_dir() }
    }
}

/// How the daemon is launched and reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_query_url")]
    pub query_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "bool_true")]
    pub autostart: bool,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_binary()          -> PathBuf { PathBuf::from("./daemon") }
fn default_working_dir()     -> PathBuf { PathBuf::from("../../build/bin") }
fn default_query_url()       -> String  { "http://localhost:8080/query".to_string() }
fn default_request_timeout() -> u64     { 10 }
fn default_stop_timeout()    -> u64     { 5 }
fn bool_true()               -> bool    { true }

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            working_dir: default_working_dir(),
            query_url: default_query_url(),
            request_timeout_secs: default_request_timeout(),
            autostart: bool_true(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl DaemonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Settings for the console front end that talks to the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    #[serde(default = "default_live_interval")]
    pub live_interval_ms: u64,
}

fn default_proxy_url()     -> String { "http://localhost:3000/query".to_string() }
fn default_live_interval() -> u64    { 2000 }

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { proxy_url: default_proxy_url(), live_interval_ms: default_live_interval() }
    }
}

impl ConsoleConfig {
    pub fn live_interval(&self) -> Duration {
        Duration::from_millis(self.live_interval_ms)
    }
}


impl Config {
    /// Load configuration from hmsconsole.toml.
    /// Checks HMSCONSOLE_CONFIG env var first, then current directory.
    /// Only an explicitly named file has to exist; otherwise defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("HMSCONSOLE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work: zero timeouts and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("daemon.request_timeout_secs", self.daemon.request_timeout_secs),
            ("daemon.stop_timeout_secs", self.daemon.stop_timeout_secs),
            ("console.live_interval_ms", self.console.live_interval_ms),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Invalid(format!("{} must be greater than zero", key))),
            None => Ok(()),
        }
    }

    /// Apply HMSCONSOLE_* overrides.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("HMSCONSOLE_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = lookup("HMSCONSOLE_DAEMON_URL") {
            self.daemon.query_url = url;
        }
        if let Some(url) = lookup("HMSCONSOLE_PROXY_URL") {
            self.console.proxy_url = url;
        }
    }
}
