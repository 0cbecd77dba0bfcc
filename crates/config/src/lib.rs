//! Configuration loading, validation, and management for codevox.
//!
//! Loads configuration from `~/.codevox/config.toml` with environment
//! variable overrides. The loaded structure is passed explicitly into the
//! agent loop, tool catalog, and gateway at construction time; nothing
//! reads it as ambient global state, so concurrent requests (and tests)
//! can carry different configurations without interfering.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the model API key (checked first).
pub const API_KEY_ENV: &str = "CODEVOX_API_KEY";
/// Fallback environment variable, matching the OpenAI SDK convention.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.codevox/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key. Usually supplied per request by the caller; this is
    /// the CLI fallback only. Never logged, redacted from Debug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Maximum model calls per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Root directory for generated projects. Every tool path resolves
    /// under this directory.
    #[serde(default = "default_projects_root")]
    pub projects_root: PathBuf,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tool execution policy
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_steps() -> u32 {
    20
}
fn default_projects_root() -> PathBuf {
    PathBuf::from("ai_projects")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            max_steps: default_max_steps(),
            projects_root: default_projects_root(),
            gateway: GatewayConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("max_steps", &self.max_steps)
            .field("projects_root", &self.projects_root)
            .field("gateway", &self.gateway)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Requests per minute per client on the plain JSON endpoint
    #[serde(default = "default_ask_rate_limit")]
    pub ask_rate_limit_per_minute: usize,

    /// Requests per minute per client on the JSON-RPC endpoint
    /// (higher: a session needs several calls)
    #[serde(default = "default_rpc_rate_limit")]
    pub rpc_rate_limit_per_minute: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_ask_rate_limit() -> usize {
    10
}
fn default_rpc_rate_limit() -> usize {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ask_rate_limit_per_minute: default_ask_rate_limit(),
            rpc_rate_limit_per_minute: default_rpc_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Whether `create_file` may overwrite an existing file.
    /// Defaults to true, matching the original behavior.
    #[serde(default = "default_true")]
    pub allow_overwrite: bool,

    /// Timeout for `run_command` executions, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Allowed command heads for `run_command`. Empty list allows all.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_command_timeout() -> u64 {
    30
}

/// Safe development commands only: version checks, listings, VCS and
/// package-manager reads.
fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "dir", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "find",
        "which", "git", "cargo", "rustc", "node", "npm", "python", "pip",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            allow_overwrite: true,
            command_timeout_secs: default_command_timeout(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

impl AppConfig {
    /// The default config file location: `~/.codevox/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::home_dir().join(".codevox").join("config.toml")
    }

    fn home_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        let var = "USERPROFILE";
        #[cfg(not(target_os = "windows"))]
        let var = "HOME";
        std::env::var(var).map(PathBuf::from).unwrap_or_default()
    }

    /// Load configuration from the default location, falling back to
    /// defaults when no file exists, then apply environment overrides
    /// and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path (used by tests).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            let parsed: AppConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
            debug!(path = %path.display(), "Loaded config file");
            parsed
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.api_key = Some(key);
        } else if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.api_key = Some(key);
        }
    }

    /// Validate settings that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid("default_model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::Invalid(format!(
                "default_temperature must be in [0.0, 2.0], got {}",
                self.default_temperature
            )));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        if self.projects_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("projects_root must not be empty".into()));
        }
        if self.tools.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tools.command_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
