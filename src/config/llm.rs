// ABOUTME: LLM gateway configuration for backend selection, credentials, and endpoints
// ABOUTME: Built once from the environment and handed to the service as a validated struct
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use glimmer_core::constants::llm;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::cache::CacheConfig;
use super::types::PlatformType;
use crate::errors::{AppError, AppResult};

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Selected backend
    pub platform: PlatformType,
    /// Hosted API settings
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Local inference settings
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl LlmConfig {
    /// Load the full gateway configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            platform: PlatformType::from_env(),
            openai: OpenAiConfig::from_env(),
            ollama: OllamaConfig::from_env(),
            cache: CacheConfig::from_env(),
        };
        debug!(
            platform = %config.platform,
            cache.enabled = config.cache.enabled,
            cache.backend = %config.cache.backend,
            "Loaded LLM configuration"
        );
        config
    }

    /// Configuration for the echo backend with caching disabled
    #[must_use]
    pub fn echo() -> Self {
        Self {
            platform: PlatformType::Echo,
            cache: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            ..Self::default()
        }
    }

    /// Check the settings required by the selected backend
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when the hosted backend has no API key and
    /// `CONFIG_ERROR` when an endpoint URL does not parse.
    pub fn validate(&self) -> AppResult<()> {
        match self.platform {
            PlatformType::OpenAi => {
                if self.openai.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::config_missing(OpenAiConfig::API_KEY_ENV));
                }
                validate_url("OPENAI_BASE_URL", &self.openai.base_url)
            }
            PlatformType::Ollama => {
                validate_url("OLLAMA_URL", &self.ollama.url)?;
                if let Some(fallback) = &self.ollama.fallback_url {
                    validate_url("OLLAMA_FALLBACK_URL", fallback)?;
                }
                Ok(())
            }
            PlatformType::Echo => Ok(()),
        }
    }
}

fn validate_url(key: &str, value: &str) -> AppResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| AppError::config(format!("{key} is not a valid URL ({value}): {e}")))
}

/// Hosted `OpenAI`-compatible API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Bearer token for the API
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Default model
    pub model: String,
    /// API base URL including the version segment
    pub base_url: String,
    /// Models exposed by `list_models`
    pub allowed_models: Vec<String>,
    /// Price in USD per million tokens
    pub cost_per_million_tokens: f64,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: llm::OPENAI_DEFAULT_MODEL.to_owned(),
            base_url: llm::OPENAI_DEFAULT_BASE_URL.to_owned(),
            allowed_models: llm::OPENAI_DEFAULT_ALLOWED_MODELS
                .iter()
                .map(|&m| m.to_owned())
                .collect(),
            cost_per_million_tokens: llm::OPENAI_DEFAULT_COST_PER_MILLION,
            timeout_secs: llm::OPENAI_TIMEOUT_SECS,
        }
    }
}

impl OpenAiConfig {
    /// Environment variable holding the API key
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    /// Load hosted API settings from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var(Self::API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            model: env::var("OPENAI_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.model),
            base_url: env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.base_url),
            allowed_models: env::var("OPENAI_ALLOWED_MODELS")
                .ok()
                .map(|list| parse_list(&list))
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.allowed_models),
            cost_per_million_tokens: env::var("OPENAI_COST_PER_MILLION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cost_per_million_tokens),
            timeout_secs: env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Per-call timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Local inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Primary endpoint
    pub url: String,
    /// Endpoint retried once when the primary fails
    pub fallback_url: Option<String>,
    /// Default model
    pub model: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Bounded idle-connection pool per host
    pub max_idle_connections: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: llm::OLLAMA_DEFAULT_URL.to_owned(),
            fallback_url: None,
            model: llm::OLLAMA_DEFAULT_MODEL.to_owned(),
            timeout_secs: llm::OLLAMA_TIMEOUT_SECS,
            connect_timeout_secs: llm::OLLAMA_CONNECT_TIMEOUT_SECS,
            max_idle_connections: llm::OLLAMA_MAX_IDLE_CONNECTIONS,
        }
    }
}

impl OllamaConfig {
    /// Load local inference settings from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("OLLAMA_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.url),
            fallback_url: env::var("OLLAMA_FALLBACK_URL")
                .ok()
                .filter(|u| !u.is_empty()),
            model: env::var("OLLAMA_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.model),
            timeout_secs: env::var("OLLAMA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            connect_timeout_secs: defaults.connect_timeout_secs,
            max_idle_connections: env::var("OLLAMA_MAX_IDLE_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_idle_connections),
        }
    }

    /// Per-call timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
