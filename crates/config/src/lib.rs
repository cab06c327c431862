//! Configuration loading, validation, and management for adpilot.
//!
//! Loads configuration from `~/.adpilot/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.adpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to drive the loop with
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Loop controller settings
    #[serde(default, rename = "loop")]
    pub run: LoopConfig,

    /// Decision store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Exploration tool executor settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
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
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("run", &self.run)
            .field("store", &self.store)
            .field("tools", &self.tools)
            .field("provider", &self.provider)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Recommendation cap per run
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// Model turn ceiling per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Advertise exploration tools to the model
    #[serde(default = "default_true")]
    pub enable_exploration: bool,

    /// Advertise recommendation tools (false = exploration-only mode)
    #[serde(default = "default_true")]
    pub enable_recommendations: bool,

    /// Free-form business context appended to the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_context: Option<String>,

    /// How many prior decisions feed the digest
    #[serde(default = "default_prior_decisions_limit")]
    pub prior_decisions_limit: usize,

    /// Wall-clock deadline per run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

fn default_max_recommendations() -> usize {
    4
}
fn default_max_iterations() -> u32 {
    200
}
fn default_prior_decisions_limit() -> usize {
    20
}
fn default_true() -> bool {
    true
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_recommendations: default_max_recommendations(),
            max_iterations: default_max_iterations(),
            enable_exploration: true,
            enable_recommendations: true,
            business_context: None,
            prior_decisions_limit: default_prior_decisions_limit(),
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Decision expiry horizon
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
}

fn default_store_path() -> String {
    AppConfig::config_dir()
        .join("decisions.db")
        .to_string_lossy()
        .into_owned()
}
fn default_expiry_days() -> i64 {
    7
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            expiry_days: default_expiry_days(),
        }
    }
}

/// Which exploration executor to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Forward tool calls to a data-query service
    #[default]
    Http,
    /// Replay canned payloads from a JSON file
    Fixtures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub executor: ExecutorKind,

    /// Base URL of the data-query service (http executor)
    #[serde(default = "default_endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Path to a JSON fixtures file (fixtures executor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<String>,

    /// Per-call timeout
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> Option<String> {
    Some("http://localhost:8081".into())
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::default(),
            endpoint: default_endpoint(),
            fixtures_path: None,
            timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Override the model API base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.adpilot/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides:
    /// - `ADPILOT_API_KEY`, then `ANTHROPIC_API_KEY` (when no key is configured)
    /// - `ADPILOT_MODEL`
    /// - `ADPILOT_STORE_PATH`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("ADPILOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("ADPILOT_MODEL") {
            config.model = model;
        }

        if let Ok(store_path) = std::env::var("ADPILOT_STORE_PATH") {
            config.store.path = store_path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".adpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.run.max_recommendations == 0 {
            return Err(ConfigError::ValidationError(
                "loop.max_recommendations must be at least 1".into(),
            ));
        }

        if self.run.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "loop.max_iterations must be at least 1".into(),
            ));
        }

        if !self.run.enable_exploration && !self.run.enable_recommendations {
            return Err(ConfigError::ValidationError(
                "at least one of loop.enable_exploration and loop.enable_recommendations must be true"
                    .into(),
            ));
        }

        if self.store.expiry_days < 1 {
            return Err(ConfigError::ValidationError(
                "store.expiry_days must be at least 1".into(),
            ));
        }

        match self.tools.executor {
            ExecutorKind::Http if self.tools.endpoint.is_none() => Err(
                ConfigError::ValidationError("tools.endpoint is required for the http executor".into()),
            ),
            ExecutorKind::Fixtures if self.tools.fixtures_path.is_none() => {
                Err(ConfigError::ValidationError(
                    "tools.fixtures_path is required for the fixtures executor".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            run: LoopConfig::default(),
            store: StoreConfig::default(),
            tools: ToolsConfig::default(),
            provider: ProviderConfig::default(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.max_recommendations, 4);
        assert_eq!(config.run.max_iterations, 200);
        assert!(config.run.enable_exploration);
        assert_eq!(config.store.expiry_days, 7);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.run.max_recommendations, config.run.max_recommendations);
    }

    #[test]
    fn zero_cap_rejected() {
        let mut config = AppConfig::default();
        config.run.max_recommendations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_executor_requires_endpoint() {
        let mut config = AppConfig::default();
        config.tools.endpoint = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tools.endpoint"));
    }

    #[test]
    fn all_tools_disabled_rejected() {
        let mut config = AppConfig::default();
        config.run.enable_exploration = false;
        config.run.enable_recommendations = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.run.max_recommendations, 4);
    }

    #[test]
    fn loop_section_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
model = "claude-haiku"

[loop]
max_recommendations = 2
enable_recommendations = false
business_context = "Q4 is peak season; protect brand campaigns."

[tools]
executor = "fixtures"
fixtures_path = "fixtures.json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.model, "claude-haiku");
        assert_eq!(config.run.max_recommendations, 2);
        assert_eq!(config.run.max_iterations, 200);
        assert!(!config.run.enable_recommendations);
        assert!(config.run.business_context.unwrap().contains("peak season"));
        assert_eq!(config.tools.executor, ExecutorKind::Fixtures);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[loop\nmax_recommendations = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
