//! Configuration management for the MindEase backend.
//!
//! The service reads an optional configuration file at `~/.mindease/config.json`
//! (or the path named by `MINDEASE_CONFIG`), then applies environment overrides.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORT` → server.port
//! - `MINDEASE_BIND_ADDRESS` → server.host
//! - `OPENROUTER_API_KEY` → ai.api_key
//! - `OPENROUTER_BASE_URL` → ai.base_url
//! - `MINDEASE_MODEL` → ai.model
//! - `MINDEASE_LOG_LEVEL` → observability.log_level
//! - `MINDEASE_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Environment variable holding an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "MINDEASE_CONFIG";

/// Upper bound accepted for `ai.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".mindease"),
        |dirs| dirs.home_dir().join(".mindease"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| config_dir().join("config.json"), PathBuf::from)
}

// ============================================================================
// AI Credential
// ============================================================================

/// Outcome of resolving the completion API credential.
///
/// Resolved once at startup; an absent credential disables AI calls but never
/// prevents the service from starting.
#[derive(Clone, PartialEq, Eq)]
pub enum AiCredential {
    Present(String),
    Absent,
}

impl AiCredential {
    /// Resolve from an optional key. Blank keys count as absent.
    pub fn from_key(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some(k) if !k.is_empty() => Self::Present(k.to_string()),
            _ => Self::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Present(k) => Some(k),
            Self::Absent => None,
        }
    }
}

// Keys must never reach the logs.
impl std::fmt::Debug for AiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present(_) => f.write_str("Present(***)"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion API configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Rolling conversation window configuration
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration, apply environment overrides, and validate.
    ///
    /// Runs before logging is set up, so anything worth reporting comes back
    /// as notices for the caller to log once a subscriber exists.
    pub fn load_with_env() -> Result<(Self, Vec<String>)> {
        let path = config_path();
        let mut notices = Vec::new();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            notices.push(format!(
                "Config file {} not found, using defaults",
                path.display()
            ));
            Self::default()
        };
        notices.extend(config.apply_env_overrides());
        config.validate().context("Invalid configuration")?;
        Ok((config, notices))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Returns a notice for every override that was ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => ignored.push(format!(
                    "Ignoring invalid PORT '{port}', keeping {}",
                    self.server.port
                )),
            }
        }
        if let Some(host) = lookup("MINDEASE_BIND_ADDRESS") {
            self.server.host = host;
        }

        if let Some(key) = lookup("OPENROUTER_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENROUTER_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(model) = lookup("MINDEASE_MODEL") {
            self.ai.model = model;
        }

        if let Some(level) = lookup("MINDEASE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("MINDEASE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        ignored
    }

    /// Check value ranges that would otherwise fail at request time.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::invalid_field(
                "server.host",
                format!("'{}' is not an IP address", self.server.host),
            ));
        }
        if self.conversation.max_history == 0 {
            return Err(Error::invalid_field(
                "conversation.max_history",
                "must be at least 1",
            ));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(Error::invalid_field(
                "ai.temperature",
                "must be between 0.0 and 2.0",
            ));
        }
        if self.ai.max_retries > MAX_RETRIES_LIMIT {
            return Err(Error::invalid_field(
                "ai.max_retries",
                format!("must be at most {MAX_RETRIES_LIMIT}"),
            ));
        }
        if self.ai.timeout_secs == 0 {
            return Err(Error::invalid_field("ai.timeout_secs", "must be positive"));
        }
        if !matches!(self.observability.log_format.as_str(), "json" | "pretty") {
            return Err(Error::invalid_field(
                "observability.log_format",
                format!("unknown format '{}'", self.observability.log_format),
            ));
        }
        Ok(())
    }

    /// Resolve the completion API credential.
    pub fn ai_credential(&self) -> AiCredential {
        AiCredential::from_key(self.ai.api_key.as_deref())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Completion API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenRouter API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Per-attempt request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

/// Rolling conversation window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Number of turns kept as context
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openrouter/auto".into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_max_history() -> usize {
    6
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ai.model, "openrouter/auto");
        assert_eq!(config.ai.temperature, 0.7);
        assert_eq!(config.ai.timeout_secs, 20);
        assert_eq!(config.ai.max_retries, 2);
        assert_eq!(config.ai.retry_delay_ms, 1000);
        assert_eq!(config.conversation.max_history, 6);
        assert!(config.validate().is_ok());
        assert!(!config.ai_credential().is_present());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 8080}}, "observability": {{"level": "debug"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.conversation.max_history, 6);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("PORT", "10000"),
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("MINDEASE_MODEL", "openai/gpt-4o-mini"),
            ("MINDEASE_LOG_FORMAT", "json"),
        ]));

        assert_eq!(config.server.port, 10000);
        assert_eq!(config.ai.model, "openai/gpt-4o-mini");
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(
            config.ai_credential(),
            AiCredential::Present("sk-or-test".into())
        );
    }

    #[test]
    fn test_invalid_port_is_ignored_and_reported() {
        let mut config = Config::default();
        let ignored = config.apply_overrides(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 5000);
        assert_eq!(ignored.len(), 1);
        assert!(ignored[0].contains("not-a-port"));
    }

    #[test]
    fn test_valid_overrides_report_nothing() {
        let mut config = Config::default();
        let ignored = config.apply_overrides(lookup_from(&[("PORT", "8080")]));
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_blank_key_is_absent() {
        assert_eq!(AiCredential::from_key(Some("   ")), AiCredential::Absent);
        assert_eq!(AiCredential::from_key(None), AiCredential::Absent);
        assert_eq!(
            AiCredential::from_key(Some(" key ")).key(),
            Some("key")
        );
    }

    #[test]
    fn test_credential_debug_hides_key() {
        let credential = AiCredential::Present("sk-or-secret".into());
        assert_eq!(format!("{credential:?}"), "Present(***)");

        let mut ai = AiConfig::default();
        ai.api_key = Some("sk-or-secret".into());
        assert!(!format!("{ai:?}").contains("sk-or-secret"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.conversation.max_history = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ai.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ai.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ai.max_retries = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ai.max_retries"));

        let mut config = Config::default();
        config.ai.max_retries = MAX_RETRIES_LIMIT;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.server.host = "localhost:80".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.observability.log_format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("observability.log_format"));
    }
}
