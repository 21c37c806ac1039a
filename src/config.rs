//! Configuration file management for certcheck.
//!
//! Settings come from three places with clear precedence rules:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (certcheck.toml or specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! domains = ["example.com", "expired.badssl.com"]
//! output = "summary"
//! exit_code = 1
//! timeout_secs = 10
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::fetcher::DEFAULT_TIMEOUT;

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Domains to validate
    pub domains: Option<Vec<String>>,
    /// Output format: json, text, summary
    pub output: Option<String>,
    /// Exit code to use when a domain is expired, mismatched or unreachable
    pub exit_code: Option<i32>,
    /// Connect/handshake timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

impl Default for Config {
    /// - `domains`: None (must be provided)
    /// - `output`: "summary"
    /// - `exit_code`: 0
    /// - `timeout_secs`: 10
    /// - `prometheus.enabled`: false
    /// - `prometheus.address`: "http://localhost:9091"
    fn default() -> Self {
        Config {
            domains: None,
            output: Some("summary".to_string()),
            exit_code: Some(0),
            timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use certcheck::config::Config;
    /// let config = Config::from_file("certcheck.toml")?;
    /// # Ok::<(), certcheck::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, `other` winning wherever it
    /// has a value.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.domains.is_some() {
            self.domains = other.domains;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Builds a Config holding only the values given on the command line.
    pub fn from_cli_args(
        domains: Option<Vec<String>>,
        output: Option<String>,
        exit_code: Option<i32>,
        timeout_secs: Option<u64>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        Config {
            domains,
            output,
            exit_code,
            timeout_secs,
            prometheus: Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            }),
        }
    }

    /// Connect/handshake timeout. Zero would disable the bound entirely and
    /// is rejected.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match self.timeout_secs {
            Some(0) => Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn prometheus_enabled(&self) -> bool {
        self.prometheus
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    pub fn prometheus_address(&self) -> String {
        self.prometheus
            .as_ref()
            .and_then(|p| p.address.clone())
            .unwrap_or_else(|| "http://localhost:9091".to_string())
    }

    /// Pretty-printed TOML with every option set, for bootstrapping a
    /// configuration file.
    pub fn example_toml() -> String {
        let example = Config {
            domains: Some(vec![
                "example.com".to_string(),
                "expired.badssl.com".to_string(),
                "wrong.host.badssl.com".to_string(),
            ]),
            output: Some("summary".to_string()),
            exit_code: Some(1),
            timeout_secs: Some(10),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (out of range values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
