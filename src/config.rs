//! Configuration management module
//!
//! YAML file plus environment overrides. Everything here is read once at startup.

use std::env;
use std::path::PathBuf;

use action_primitives::Timings;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::diagnostics::DiagnosticsConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("portal_url is not set (config file or RENEWAL_SERVICE_URL)")]
    MissingPortalUrl,

    #[error("portal_url '{0}' is not a valid http(s) URL")]
    InvalidPortalUrl(String),

    #[error("max_concurrent_sessions must be at least 1")]
    ZeroSessionLimit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    /// Daily rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
            file_prefix: "plate-renewal.log".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Landing page of the renewal portal.
    pub portal_url: String,
    pub max_concurrent_sessions: usize,
    /// How long a request may queue for a free session slot.
    pub admission_wait_secs: u64,
    /// Upper bound on one whole workflow. Unset means no bound.
    pub session_deadline_secs: Option<u64>,
    pub timings: Timings,
    pub browser: CdpConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_url: String::new(),
            max_concurrent_sessions: 4,
            admission_wait_secs: 30,
            session_deadline_secs: None,
            timings: Timings::default(),
            browser: CdpConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Applies `RENEWAL_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_var("RENEWAL_SERVICE_URL") {
            self.portal_url = url;
        }
        if let Some(raw) = non_empty_var("RENEWAL_HEADLESS") {
            let lower = raw.to_ascii_lowercase();
            self.browser.headless = !matches!(lower.as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(path) = non_empty_var("RENEWAL_CHROME") {
            self.browser.executable = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_empty_var("RENEWAL_MAX_SESSIONS") {
            match raw.parse::<usize>() {
                Ok(limit) => self.max_concurrent_sessions = limit,
                Err(err) => warn!(value = %raw, ?err, "ignoring invalid RENEWAL_MAX_SESSIONS"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let raw = self.portal_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingPortalUrl);
        }
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidPortalUrl(raw.to_string())),
        }
        if self.max_concurrent_sessions == 0 {
            return Err(ConfigError::ZeroSessionLimit);
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
