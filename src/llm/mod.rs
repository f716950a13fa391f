// ABOUTME: LLM platform abstraction layer for interchangeable language-model backends
// ABOUTME: Defines the Platform contract, call parameters, responses, and shared helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # LLM Platform Interface
//!
//! This module defines the contract every language-model backend implements,
//! plus the value types flowing through it.
//!
//! ## Key Concepts
//!
//! - **`Platform`**: Async trait with chat, history chat, image description, and model listing
//! - **`ChatParameters`**: Prompt, system prompt, optional model, and cache-control flags
//! - **`CachedPlatform`**: Decorator adding response caching around any `Platform`
//! - **`LlmService`**: Facade owning one configured (possibly cached) platform
//!
//! ## Example: Using the echo backend
//!
//! ```rust,no_run
//! use glimmer::config::LlmConfig;
//! use glimmer::llm::{ChatOptions, LlmService};
//!
//! # async fn example() -> glimmer::errors::AppResult<()> {
//! let service = LlmService::memory_cache(&LlmConfig::echo())?;
//! let reply = service.chat("Say hi", "", ChatOptions::default()).await?;
//! println!("{} ({} tokens)", reply.text, reply.usage.total_tokens);
//! # Ok(())
//! # }
//! ```

/// Response caching decorator
pub mod cached;
/// Deterministic echo backend for tests and offline use
pub mod echo;
/// Local inference backend with fallback endpoint
pub mod ollama;
/// HTTP client for the local inference API
pub mod ollama_client;
/// Hosted `OpenAI`-compatible backend
pub mod openai;
/// Backend selection from configuration
pub mod provider;
/// Service facade consumed by the chat manager
pub mod service;

pub use cached::CachedPlatform;
pub use echo::EchoPlatform;
pub use glimmer_core::models::{ChatMessage, ChatRole, Usage};
pub use ollama::OllamaPlatform;
pub use ollama_client::{HttpOllamaClient, OllamaChatResponse, OllamaClient, OllamaModel};
pub use openai::OpenAiPlatform;
pub use provider::BackendPlatform;
pub use service::{ChatOptions, LlmInfo, LlmService, PlatformInfo};

pub use crate::config::PlatformType;

use async_trait::async_trait;
use glimmer_core::constants::llm::CHARS_PER_TOKEN;
use serde::{Deserialize, Serialize};

use crate::errors::{AppResult, LlmError};

// ============================================================================
// Call Parameters
// ============================================================================

/// Per-call cache control flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheControl {
    /// Skip the cache read but still store the fresh response
    pub ignore_cache: bool,
    /// Bypass the cache entirely (no read, no write)
    pub disable_cache: bool,
}

/// Parameters of a chat call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParameters {
    /// User prompt (empty in history mode)
    pub prompt: String,
    /// System prompt (empty for none)
    pub system_prompt: String,
    /// Model override; `None` or empty uses the platform default
    pub model: Option<String>,
    /// Cache control flags
    #[serde(default)]
    pub cache: CacheControl,
}

impl ChatParameters {
    /// Create parameters for a single-turn prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set the model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set cache control flags
    #[must_use]
    pub fn with_cache(mut self, cache: CacheControl) -> Self {
        self.cache = cache;
        self
    }

    /// The explicit model override, ignoring empty strings
    #[must_use]
    pub fn requested_model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.is_empty())
    }

    /// Resolve the effective model against a platform default
    ///
    /// # Errors
    ///
    /// Returns `ModelNotSpecified` when neither names a model.
    pub fn resolve_model(
        &self,
        default_model: &str,
        platform: &'static str,
    ) -> Result<String, LlmError> {
        self.requested_model()
            .or_else(|| Some(default_model).filter(|m| !m.is_empty()))
            .map(str::to_owned)
            .ok_or(LlmError::ModelNotSpecified { platform })
    }
}

/// Parameters of an image description call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeImageParameters {
    /// Prompt, system prompt, model, and cache flags
    pub chat: ChatParameters,
    /// Original file name of the image
    pub file_name: String,
    /// Raw image bytes
    pub image: Vec<u8>,
}

// ============================================================================
// Responses
// ============================================================================

/// Response of a chat call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text
    pub text: String,
    /// Token/cost accounting
    pub usage: Usage,
}

/// Response of an image description call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeImageResponse {
    /// Generated description
    pub text: String,
    /// Token/cost accounting
    pub usage: Usage,
}

/// One entry of a platform's model catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model name as accepted by the backend
    pub name: String,
    /// Human-readable size (empty when unknown)
    pub size_human: String,
    /// Whether this is the platform's configured default
    pub is_default: bool,
}

// ============================================================================
// Platform Trait
// ============================================================================

/// Language-model backend contract
///
/// Shared preconditions: `chat` requires a non-empty prompt, `chat_with_history`
/// a non-empty message list, and every call needs an effective model from the
/// parameters or the platform default.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which backend this is
    fn platform_type(&self) -> PlatformType;

    /// Configured default model (empty when none)
    fn default_model(&self) -> &str;

    /// Single-turn chat
    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse>;

    /// Chat over an ordered conversation history
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse>;

    /// Describe an image
    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse>;

    /// List available models, sorted by name
    async fn list_models(&self) -> AppResult<Vec<ModelInfo>>;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Rough token estimate: one token per four bytes of text
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.len() / CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}

/// Sort a model list by name
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Mark the entry named `default_model` as the default
pub fn mark_default(models: &mut [ModelInfo], default_model: &str) {
    for model in models {
        model.is_default = model.name == default_model;
    }
}

/// Format a byte count as `B`, `KB`, `MB`, or `GB` with one decimal
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if size >= GB {
        format!("{:.1} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else if size >= KB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Reject empty single-turn prompts
pub(crate) fn require_prompt(params: &ChatParameters) -> Result<(), LlmError> {
    if params.prompt.trim().is_empty() {
        Err(LlmError::EmptyPrompt)
    } else {
        Ok(())
    }
}

/// Reject empty histories
pub(crate) const fn require_messages(messages: &[ChatMessage]) -> Result<(), LlmError> {
    if messages.is_empty() {
        Err(LlmError::NoMessages)
    } else {
        Ok(())
    }
}
