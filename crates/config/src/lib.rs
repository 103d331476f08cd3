//! Configuration loading, validation, and management for clipflow.
//!
//! Loads configuration from `~/.clipflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use clipflow_core::MismatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.clipflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Orchestrator (executor) settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Clipboard analyzer settings (clustering, prediction)
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-dispatch timeout in milliseconds
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Maximum concurrent dispatches within one step
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_dispatches: usize,

    /// What to do with matched items whose category the role does not accept
    #[serde(default)]
    pub on_category_mismatch: MismatchPolicy,
}

fn default_dispatch_timeout_ms() -> u64 {
    30_000
}
fn default_max_concurrent() -> usize {
    4
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            max_concurrent_dispatches: default_max_concurrent(),
            on_category_mismatch: MismatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum gap between entries in the same time cluster
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold_secs: f64,

    /// Number of most recent entries used for workflow prediction
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

fn default_cluster_threshold() -> f64 {
    60.0
}
fn default_recent_window() -> usize {
    5
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cluster_threshold_secs: default_cluster_threshold(),
            recent_window: default_recent_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Origins allowed by CORS. Empty = no CORS headers.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    42680
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when neither RUST_LOG nor CLIPFLOW_LOG is set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.clipflow/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides (highest priority).
    ///
    /// `lookup` is `std::env::var` in production; tests inject a map.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("CLIPFLOW_DISPATCH_TIMEOUT_MS") {
            self.orchestrator.dispatch_timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CLIPFLOW_DISPATCH_TIMEOUT_MS must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup("CLIPFLOW_MAX_CONCURRENCY") {
            self.orchestrator.max_concurrent_dispatches = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CLIPFLOW_MAX_CONCURRENCY must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup("CLIPFLOW_ON_MISMATCH") {
            self.orchestrator.on_category_mismatch =
                raw.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(level) = lookup("CLIPFLOW_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clipflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.dispatch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.dispatch_timeout_ms must be > 0".into(),
            ));
        }

        if !(1..=256).contains(&self.orchestrator.max_concurrent_dispatches) {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_concurrent_dispatches must be between 1 and 256".into(),
            ));
        }

        if !(self.analyzer.cluster_threshold_secs >= 0.0) {
            return Err(ConfigError::ValidationError(
                "analyzer.cluster_threshold_secs must be >= 0".into(),
            ));
        }

        if self.analyzer.recent_window == 0 {
            return Err(ConfigError::ValidationError(
                "analyzer.recent_window must be >= 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `clipflow config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
