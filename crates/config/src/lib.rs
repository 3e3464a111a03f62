//! Configuration loading, validation, and management for splforge.
//!
//! Loads configuration from `~/.splforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use splforge_core::ModelConfig;
use std::path::{Path, PathBuf};

pub use splforge_core::AgentKind;

/// The root configuration structure.
///
/// Maps directly to `~/.splforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used by every model-call statement
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Executor settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Outbound API settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Where binary API results are written
    #[serde(default)]
    pub blobs: BlobConfig,

    /// Reference retriever settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("engine", &self.engine)
            .field("transport", &self.transport)
            .field("blobs", &self.blobs)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Short-memory cap in entries
    #[serde(default = "default_memory_cap")]
    pub memory_cap: usize,

    /// Whole-invocation deadline
    #[serde(default = "default_invocation_timeout_ms")]
    pub invocation_timeout_ms: u64,

    /// Ceiling on model rounds in the tool-calling loop
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    #[serde(default)]
    pub agent_type: AgentKind,

    /// Ask the model for follow-up suggestions after a run
    #[serde(default)]
    pub suggestions: bool,
}

fn default_memory_cap() -> usize {
    10
}
fn default_invocation_timeout_ms() -> u64 {
    120_000
}
fn default_max_tool_iterations() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_cap: default_memory_cap(),
            invocation_timeout_ms: default_invocation_timeout_ms(),
            max_tool_iterations: default_max_tool_iterations(),
            agent_type: AgentKind::default(),
            suggestions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_dir")]
    pub dir: PathBuf,
}

fn default_blob_dir() -> PathBuf {
    AppConfig::config_dir().join("blobs")
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self { dir: default_blob_dir() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Text blocks returned per data statement
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path with env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, apply overrides from `env`, then validate the result.
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(env);
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

    // Environment variables win over the file.
    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = env("SPLFORGE_API_KEY").or_else(|| env("OPENAI_API_KEY"));
        }
        if let Some(url) = env("SPLFORGE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = env("SPLFORGE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".splforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError("default_model must not be empty".into()));
        }
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.engine.memory_cap == 0 {
            return Err(ConfigError::ValidationError(
                "engine.memory_cap must be at least 1".into(),
            ));
        }
        if self.engine.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.engine.invocation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "engine.invocation_timeout_ms must be positive".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The model configuration every model-call statement is bound to.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.default_model.clone(),
            temperature: self.default_temperature,
            max_tokens: Some(self.default_max_tokens),
        }
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            engine: EngineConfig::default(),
            transport: TransportConfig::default(),
            blobs: BlobConfig::default(),
            retrieval: RetrievalConfig::default(),
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
