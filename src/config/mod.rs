//! Persisted settings for the AI assistance layer
//!
//! Supports configuration via:
//! 1. Config file (~/.config/reqsight/config.toml)
//! 2. Environment variables (ANTHROPIC_API_KEY, GEMINI_API_KEY, etc.)
//!
//! Settings are loaded once and resolved into an explicit
//! [`ProviderConfig`] that callers thread through each call; nothing in
//! the API layer reads persisted state on its own.

use crate::api::{ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Main settings structure, one active instance at a time. Overwritten
/// only by an explicit save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which provider handles calls
    pub provider: ProviderKind,

    /// Anthropic configuration
    pub anthropic: AnthropicSettings,

    /// Gemini configuration
    pub gemini: GeminiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            anthropic: AnthropicSettings::default(),
            gemini: GeminiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    /// API key (can also use ANTHROPIC_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key (can also use GEMINI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-flash-latest".to_string(),
        }
    }
}

impl Settings {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reqsight")
            .join("config.toml")
    }

    /// Load settings from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load settings from a specific path; a missing file yields defaults
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = toml::from_str(&content)?;

        Ok(settings.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(provider) = std::env::var("REQSIGHT_PROVIDER") {
            match provider.to_ascii_lowercase().as_str() {
                "anthropic" => self.provider = ProviderKind::Anthropic,
                "gemini" => self.provider = ProviderKind::Gemini,
                _ => {}
            }
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            self.anthropic.model = model;
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        self
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Resolve the active provider into the config threaded through each
    /// call. A missing key becomes an empty string here and surfaces as a
    /// configuration error at call time, before any network traffic.
    pub fn active_provider(&self) -> ProviderConfig {
        match self.provider {
            ProviderKind::Anthropic => ProviderConfig::new(
                ProviderKind::Anthropic,
                self.anthropic.api_key.clone().unwrap_or_default(),
                self.anthropic.model.clone(),
            ),
            ProviderKind::Gemini => ProviderConfig::new(
                ProviderKind::Gemini,
                self.gemini.api_key.clone().unwrap_or_default(),
                self.gemini.model.clone(),
            ),
        }
    }

    /// Generate example config content
    pub fn example() -> String {
        toml::to_string_pretty(&Settings::default()).unwrap_or_default()
    }
}
