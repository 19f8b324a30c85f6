//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::Persona;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model connection
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Who the agent is
    #[serde(default)]
    pub persona: Persona,

    /// Reply probability controller
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Rolling context window
    #[serde(default)]
    pub context: ContextConfig,

    /// Edit coalescing
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Tool-calling loop limits
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Durable message log
    #[serde(default)]
    pub history: HistoryConfig,

    /// Which chat channels are listened to
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Names used when a metadata lookup fails
    #[serde(default)]
    pub placeholders: PlaceholderConfig,

    /// Abbreviation lookup service
    #[serde(default)]
    pub abbreviation: AbbreviationConfig,

    /// Delivery endpoints, in fallback order
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP client timeout for one model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.siliconflow.cn/v1".into()
}
fn default_model() -> String {
    "deepseek-ai/DeepSeek-V3".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Floor (and initial value) of the reply probability
    #[serde(default = "default_baseline")]
    pub baseline: f64,

    /// Decrease applied per plain message
    #[serde(default = "default_decay_step")]
    pub decay_step: f64,

    /// Below this, a successful reply raises the probability back to 1
    #[serde(default = "default_reengage_threshold")]
    pub reengage_threshold: f64,
}

fn default_baseline() -> f64 {
    0.3
}
fn default_decay_step() -> f64 {
    0.1
}
fn default_reengage_threshold() -> f64 {
    0.5
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            decay_step: default_decay_step(),
            reengage_threshold: default_reengage_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_context")]
    pub max_context: usize,

    /// Window size after a reset
    #[serde(default = "default_fit_context")]
    pub fit_context: usize,
}

fn default_max_context() -> usize {
    40
}
fn default_fit_context() -> usize {
    20
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context: default_max_context(),
            fit_context: default_fit_context(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_max_tool_iterations() -> u32 {
    8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "sqlite", "memory", or "none"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// SQLite database file; defaults to `~/.parley/history.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_history_backend() -> String {
    "sqlite".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Channel IDs to listen to. Empty = all.
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    #[serde(default = "default_user_placeholder")]
    pub user: String,

    #[serde(default = "default_channel_placeholder")]
    pub channel: String,

    #[serde(default = "default_guild_placeholder")]
    pub guild: String,
}

fn default_user_placeholder() -> String {
    "Unknown user".into()
}
fn default_channel_placeholder() -> String {
    "Unknown channel".into()
}
fn default_guild_placeholder() -> String {
    "Unknown guild".into()
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            user: default_user_placeholder(),
            channel: default_channel_placeholder(),
            guild: default_guild_placeholder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbbreviationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_abbreviation_url")]
    pub api_url: String,
}

fn default_true() -> bool {
    true
}
fn default_abbreviation_url() -> String {
    "https://lab.magiconch.com/api/nbnhhsh/guess".into()
}

impl Default for AbbreviationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_abbreviation_url(),
        }
    }
}

/// One delivery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// "console" or "local"
    pub kind: String,

    /// The bot's own user ID on its platform
    #[serde(default = "default_self_id")]
    pub self_id: String,

    /// Channel the endpoint reports inbound messages on
    #[serde(default = "default_endpoint_channel")]
    pub channel_id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_self_id() -> String {
    "parley".into()
}
fn default_endpoint_channel() -> String {
    "console".into()
}

fn default_endpoints() -> Vec<EndpointConfig> {
    vec![EndpointConfig {
        kind: "console".into(),
        self_id: default_self_id(),
        channel_id: default_endpoint_channel(),
        enabled: true,
    }]
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARLEY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `PARLEY_MODEL`
    /// - `PARLEY_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("PARLEY_API_KEY") {
            self.provider.api_key = Some(key);
        } else if self.provider.api_key.is_none() {
            self.provider.api_key = var("OPENAI_API_KEY");
        }

        if let Some(model) = var("PARLEY_MODEL") {
            self.provider.model = model;
        }

        if let Some(url) = var("PARLEY_BASE_URL") {
            self.provider.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// The SQLite history file, honouring `history.path`.
    pub fn history_path(&self) -> PathBuf {
        self.history
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history.db"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let t = &self.trigger;
        if !(0.0..=1.0).contains(&t.baseline) {
            return Err(ConfigError::ValidationError(
                "trigger.baseline must be between 0.0 and 1.0".into(),
            ));
        }
        if t.decay_step < 0.0 {
            return Err(ConfigError::ValidationError("trigger.decay_step must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&t.reengage_threshold) {
            return Err(ConfigError::ValidationError(
                "trigger.reengage_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.context.max_context == 0 {
            return Err(ConfigError::ValidationError("context.max_context must be > 0".into()));
        }
        if self.context.fit_context > self.context.max_context {
            return Err(ConfigError::ValidationError(
                "context.fit_context must not exceed context.max_context".into(),
            ));
        }

        if self.generation.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tool_iterations must be > 0".into(),
            ));
        }

        if !matches!(self.history.backend.as_str(), "sqlite" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "history.backend '{}' is not one of sqlite, memory, none",
                self.history.backend
            )));
        }

        for endpoint in &self.endpoints {
            if !matches!(endpoint.kind.as_str(), "console" | "local") {
                return Err(ConfigError::ValidationError(format!(
                    "endpoint kind '{}' is not one of console, local",
                    endpoint.kind
                )));
            }
            if endpoint.self_id.trim().is_empty() {
                return Err(ConfigError::ValidationError("endpoint self_id must not be empty".into()));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            persona: Persona::default(),
            trigger: TriggerConfig::default(),
            context: ContextConfig::default(),
            debounce: DebounceConfig::default(),
            generation: GenerationConfig::default(),
            history: HistoryConfig::default(),
            channels: ChannelsConfig::default(),
            placeholders: PlaceholderConfig::default(),
            abbreviation: AbbreviationConfig::default(),
            endpoints: default_endpoints(),
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
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.provider.base_url, "https://api.siliconflow.cn/v1");
        assert_eq!(config.trigger.baseline, 0.3);
        assert_eq!(config.trigger.decay_step, 0.1);
        assert_eq!(config.trigger.reengage_threshold, 0.5);
        assert_eq!(config.debounce.delay_ms, 1000);
        assert_eq!(config.generation.max_tool_iterations, 8);
        assert_eq!(config.persona.name, "Xiaoming");
        assert_eq!(config.endpoints.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("[trigger]\nbaseline = 0.2\n").unwrap();
        assert_eq!(config.trigger.baseline, 0.2);
        assert_eq!(config.trigger.decay_step, 0.1);
        assert_eq!(config.endpoints[0].kind, "console");
        assert_eq!(config.context.max_context, 40);
    }

    #[test]
    fn fit_larger_than_max_rejected() {
        let config = AppConfig {
            context: ContextConfig { max_context: 3, fit_context: 6 },
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unknown_endpoint_kind_rejected() {
        let toml_str = r#"
[[endpoints]]
kind = "carrier-pigeon"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_baseline_rejected() {
        let mut config = AppConfig::default();
        config.trigger.baseline = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PARLEY_API_KEY", "sk-parley"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("PARLEY_MODEL", "gpt-4o-mini"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-parley"));
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.base_url, "https://api.siliconflow.cn/v1");

        let mut config = AppConfig::default();
        config.apply_env(|k| (k == "OPENAI_API_KEY").then(|| "sk-openai".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-openai"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.model, "deepseek-ai/DeepSeek-V3");
    }

    #[test]
    fn default_toml_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, AppConfig::default_toml()).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.persona.name, "Xiaoming");
        assert_eq!(config.abbreviation.api_url, "https://lab.magiconch.com/api/nbnhhsh/guess");
        assert_eq!(config.endpoints.len(), 1);
    }

    #[test]
    fn history_path_defaults_under_config_dir() {
        let config = AppConfig::default();
        assert!(config.history_path().ends_with(".parley/history.db"));
    }
}
