// ABOUTME: Backend selector choosing OpenAI, Ollama, or Echo once from configuration
// ABOUTME: Tagged union implementing Platform by delegating to the selected variant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Backend Selection
//!
//! The backend is chosen once, at construction, from [`LlmConfig::platform`].
//! Set `LLM_PLATFORM` to one of:
//! - `ollama` (default): local inference with optional fallback endpoint
//! - `openai`: hosted API (requires `OPENAI_API_KEY`)
//! - `echo`: deterministic test double
//!
//! ## Example
//!
//! ```rust,no_run
//! use glimmer::config::LlmConfig;
//! use glimmer::llm::{BackendPlatform, ChatParameters, Platform};
//!
//! # async fn example() -> glimmer::errors::AppResult<()> {
//! let platform = BackendPlatform::from_config(&LlmConfig::from_env())?;
//! let response = platform.chat(&ChatParameters::new("Hello!")).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use tracing::info;

use super::{
    ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse,
    EchoPlatform, ModelInfo, OllamaPlatform, OpenAiPlatform, Platform, PlatformType,
};
use crate::config::LlmConfig;
use crate::errors::AppResult;

/// The configured language-model backend
pub enum BackendPlatform {
    /// Hosted `OpenAI`-compatible API
    OpenAi(OpenAiPlatform),
    /// Local Ollama server
    Ollama(OllamaPlatform),
    /// Deterministic echo backend
    Echo(EchoPlatform),
}

impl BackendPlatform {
    /// Build the backend selected by `config.platform`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the selected backend is missing
    /// required settings (e.g. the `OpenAI` API key).
    pub fn from_config(config: &LlmConfig) -> AppResult<Self> {
        info!(
            "Initializing LLM platform: {} (set {} to change)",
            config.platform,
            PlatformType::ENV_VAR
        );

        match config.platform {
            PlatformType::OpenAi => Ok(Self::OpenAi(OpenAiPlatform::new(config.openai.clone())?)),
            PlatformType::Ollama => Ok(Self::Ollama(OllamaPlatform::new(config.ollama.clone()))),
            PlatformType::Echo => Ok(Self::Echo(EchoPlatform::new())),
        }
    }

    fn platform(&self) -> &dyn Platform {
        match self {
            Self::OpenAi(p) => p,
            Self::Ollama(p) => p,
            Self::Echo(p) => p,
        }
    }
}

#[async_trait]
impl Platform for BackendPlatform {
    fn platform_type(&self) -> PlatformType {
        self.platform().platform_type()
    }

    fn default_model(&self) -> &str {
        self.platform().default_model()
    }

    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        self.platform().chat(params).await
    }

    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse> {
        self.platform().chat_with_history(messages, params).await
    }

    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        self.platform().describe_image(params).await
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        self.platform().list_models().await
    }
}
