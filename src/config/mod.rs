//! Configuration management for agent-dispatch
//!
//! Supports configuration via:
//! 1. Config file (~/.config/agent-dispatch/config.toml)
//! 2. Environment variables (GROQ_API_KEY, AGENT_DISPATCH_DATABASE_URL, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::GroqConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

const APP_DIR: &str = "agent-dispatch";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosted LLM API
    pub upstream: UpstreamSettings,

    /// Classification-driven model routing
    pub routing: RoutingSettings,

    /// Context window assembly
    pub context: ContextSettings,

    /// Web and file augmentation
    pub augmentation: AugmentationSettings,

    /// Read cache
    pub cache: CacheSettings,

    /// Circuit breaker around upstream calls
    pub breaker: BreakerSettings,

    /// Document store
    pub storage: StorageSettings,
}

/// Hosted LLM API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// API key (can also use GROQ_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    /// Bound on a single upstream call
    pub timeout_secs: u64,

    /// Maximum tokens for task responses
    pub max_tokens: u32,

    /// Maximum tokens per model in a comparison run
    pub comparison_max_tokens: u32,

    /// Temperature used when the agent sets none
    pub temperature: f32,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            timeout_secs: 30,
            max_tokens: 2048,
            comparison_max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl UpstreamSettings {
    pub fn client_config(&self) -> GroqConfig {
        GroqConfig {
            api_key: self.api_key.clone().unwrap_or_default(),
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Model routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Complexity above this escalates one tier
    pub complexity_threshold: usize,

    /// Words per complexity point
    pub words_per_complexity_point: usize,

    /// Model for categories missing from `models`
    pub default_model: String,

    /// Tiers from smallest to largest
    pub escalation_chain: Vec<String>,

    /// Category name to base model
    pub models: BTreeMap<String, String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        let small = "llama-3.1-8b-instant";
        let medium = "llama3-70b-8192";
        let large = "llama-3.3-70b-versatile";

        let models = [
            ("creative", medium),
            ("analytical", large),
            ("coding", medium),
            ("conversational", small),
            ("web_retrieval", medium),
            ("data_visualization", large),
            ("multimodal", large),
            ("reasoning", large),
            ("fast_response", small),
        ]
        .into_iter()
        .map(|(category, model)| (category.to_string(), model.to_string()))
        .collect();

        Self {
            complexity_threshold: 3,
            words_per_complexity_point: 10,
            default_model: small.to_string(),
            escalation_chain: vec![small.to_string(), medium.to_string(), large.to_string()],
            models,
        }
    }
}

/// Context window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Maximum characters sent upstream per call
    pub budget_chars: usize,

    /// Raw history messages kept when trimming
    pub recent_turns: usize,

    /// Memory entries folded into the summary line
    pub memory_summary_entries: usize,

    /// Characters kept per summarized response
    pub summary_chars: usize,

    /// Agent memory cap
    pub memory_cap: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            budget_chars: 8000,
            recent_turns: 6,
            memory_summary_entries: 3,
            summary_chars: 100,
            memory_cap: 10,
        }
    }
}

/// Augmentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationSettings {
    /// URLs fetched per prompt
    pub max_urls: usize,

    /// Characters kept per fetched page
    pub max_page_chars: usize,

    /// Per-page fetch timeout
    pub fetch_timeout_secs: u64,

    /// Characters in a document preview
    pub preview_chars: usize,

    /// Largest accepted upload
    pub max_upload_bytes: usize,

    /// Where uploaded files are written
    pub upload_dir: PathBuf,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            max_urls: 3,
            max_page_chars: 5000,
            fetch_timeout_secs: 10,
            preview_chars: 200,
            max_upload_bytes: 10 * 1024 * 1024,
            upload_dir: data_dir().join("uploads"),
        }
    }
}

/// Read cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether reads go through the cache
    pub enabled: bool,

    /// Entries kept before the oldest is evicted
    pub max_entries: usize,

    pub agent_ttl_secs: u64,
    pub list_ttl_secs: u64,
    pub tasks_ttl_secs: u64,
    pub templates_ttl_secs: u64,
    pub analytics_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
            agent_ttl_secs: 300,
            list_ttl_secs: 60,
            tasks_ttl_secs: 30,
            templates_ttl_secs: 3600,
            analytics_ttl_secs: 120,
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Seconds spent open before a probe is allowed
    pub cooldown_secs: u64,

    /// Probe successes needed to close again
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,

    /// sqlx connection string, used by the sqlite backend
    pub database_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_url: format!("sqlite:{}", data_dir().join("agents.db").display()),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GROQ_BASE_URL") {
            self.upstream.base_url = url;
        }

        if let Ok(url) = std::env::var("AGENT_DISPATCH_DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Ok(backend) = std::env::var("AGENT_DISPATCH_STORAGE") {
            match backend.to_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "sqlite" => self.storage.backend = StorageBackend::Sqlite,
                _ => {}
            }
        }

        if let Ok(dir) = std::env::var("AGENT_DISPATCH_UPLOAD_DIR") {
            self.augmentation.upload_dir = PathBuf::from(dir);
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.models.is_empty() {
            return Err(ConfigError::Invalid("routing.models must not be empty".to_string()));
        }
        if self.routing.escalation_chain.is_empty() {
            return Err(ConfigError::Invalid(
                "routing.escalation_chain must not be empty".to_string(),
            ));
        }
        if self.context.budget_chars == 0 {
            return Err(ConfigError::Invalid("context.budget_chars must be positive".to_string()));
        }
        if self.context.memory_cap == 0 {
            return Err(ConfigError::Invalid("context.memory_cap must be positive".to_string()));
        }
        if self.augmentation.max_urls == 0 {
            return Err(ConfigError::Invalid("augmentation.max_urls must be positive".to_string()));
        }

        Ok(())
    }

    /// Generate example config content
    pub fn example() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.upstream.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream.base_url = url.into();
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.backend = StorageBackend::Sqlite;
        self.config.storage.database_url = url.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.augmentation.upload_dir = dir.into();
        self
    }

    pub fn context_budget(mut self, chars: usize) -> Self {
        self.config.context.budget_chars = chars;
        self
    }

    pub fn memory_cap(mut self, cap: usize) -> Self {
        self.config.context.memory_cap = cap;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.breaker.failure_threshold = threshold;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.upstream.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.routing.complexity_threshold, 3);
        assert_eq!(config.routing.models.get("creative").map(String::as_str), Some("llama3-70b-8192"));
        assert_eq!(config.context.budget_chars, 8000);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .api_key("test-key")
            .in_memory()
            .context_budget(500)
            .memory_cap(2)
            .build();

        assert_eq!(config.upstream.api_key, Some("test-key".to_string()));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.context.budget_chars, 500);
        assert_eq!(config.context.memory_cap, 2);
        assert_eq!(config.upstream.client_config().api_key, "test-key");
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = ConfigBuilder::new().context_budget(0).build();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.routing.escalation_chain.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context]\nbudget_chars = 1200\n").unwrap();

        let config = Config::load_from(path).unwrap();
        assert_eq!(config.context.budget_chars, 1200);
        assert_eq!(config.context.recent_turns, 6);
        assert_eq!(config.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_example_config() {
        let example = Config::example();
        assert!(example.contains("[upstream]"));
        assert!(example.contains("[routing.models]"));
        assert!(example.contains("[breaker]"));
    }
}
