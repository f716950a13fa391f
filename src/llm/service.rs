// ABOUTME: LLM service facade owning one configured, optionally cached, platform
// ABOUTME: Exposes chat, history chat, image description, and platform info to callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, instrument, warn};

use super::{
    BackendPlatform, CacheControl, CachedPlatform, ChatMessage, ChatParameters, ChatResponse,
    DescribeImageParameters, DescribeImageResponse, ModelInfo, Platform,
};
use crate::cache::{self, CacheStorage, MemoryCacheStorage};
use crate::config::LlmConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};

// ============================================================================
// Call Options
// ============================================================================

/// Per-call options for service calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOptions {
    /// Model override
    pub model: Option<String>,
    /// Cache control flags
    pub cache: CacheControl,
}

impl ChatOptions {
    /// Use a specific model for this call
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the cache flags for this call
    #[must_use]
    pub fn with_cache(mut self, ignore_cache: bool, disable_cache: bool) -> Self {
        self.cache = CacheControl {
            ignore_cache,
            disable_cache,
        };
        self
    }

    fn into_parameters(self, prompt: String, system_prompt: &str) -> ChatParameters {
        ChatParameters {
            prompt,
            system_prompt: system_prompt.to_owned(),
            model: self.model,
            cache: self.cache,
        }
    }
}

// ============================================================================
// Info
// ============================================================================

/// One configured platform and its models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    /// Platform name (`openai`, `ollama`, `echo`)
    pub name: String,
    /// Whether this is the default platform
    pub is_default: bool,
    /// Available models, empty if listing failed
    pub models: Vec<ModelInfo>,
}

/// Platforms available through the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmInfo {
    /// Configured platforms
    pub platforms: Vec<PlatformInfo>,
}

// ============================================================================
// Service
// ============================================================================

/// Facade over the configured platform
#[derive(Clone)]
pub struct LlmService {
    platform: Arc<dyn Platform>,
    storage: Option<Arc<dyn CacheStorage>>,
}

impl LlmService {
    /// Build a service that caches in process memory only
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the selected backend cannot be built.
    pub fn memory_cache(config: &LlmConfig) -> AppResult<Self> {
        let storage: Option<Arc<dyn CacheStorage>> = config
            .cache
            .enabled
            .then(|| Arc::new(MemoryCacheStorage::new(&config.cache)) as Arc<dyn CacheStorage>);
        Self::build(config, storage)
    }

    /// Build a service using the configured cache backend
    ///
    /// The persistent backend is used only when it is selected and a database
    /// is supplied; otherwise the in-memory cache is used.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the selected backend cannot be built.
    pub fn with_database(config: &LlmConfig, database: Option<&Database>) -> AppResult<Self> {
        let storage = config
            .cache
            .enabled
            .then(|| cache::create_storage(&config.cache, database));
        Self::build(config, storage)
    }

    /// Wrap an already constructed platform without caching
    #[must_use]
    pub fn from_platform(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            storage: None,
        }
    }

    fn build(config: &LlmConfig, storage: Option<Arc<dyn CacheStorage>>) -> AppResult<Self> {
        config.validate()?;
        let backend = BackendPlatform::from_config(config)?;

        let platform: Arc<dyn Platform> = match &storage {
            Some(storage) => Arc::new(CachedPlatform::new(backend, Arc::clone(storage))),
            None => Arc::new(backend),
        };

        info!(
            platform = %platform.platform_type(),
            model = platform.default_model(),
            cache = storage.is_some(),
            "LLM service ready"
        );

        Ok(Self { platform, storage })
    }

    /// The underlying platform
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// The configured default model of the platform
    #[must_use]
    pub fn default_model(&self) -> &str {
        self.platform.default_model()
    }

    /// Single-turn chat
    ///
    /// # Errors
    ///
    /// Returns validation errors for an empty prompt or unresolved model, and
    /// backend errors from the platform.
    #[instrument(skip(self, prompt, system_prompt), fields(model = options.model.as_deref()))]
    pub async fn chat(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: ChatOptions,
    ) -> AppResult<ChatResponse> {
        let params = options.into_parameters(prompt.to_owned(), system_prompt);
        self.platform.chat(&params).await
    }

    /// Chat over an ordered message history; the prompt field stays empty
    ///
    /// # Errors
    ///
    /// Returns validation errors for an empty history or unresolved model, and
    /// backend errors from the platform.
    #[instrument(skip(self, messages, system_prompt), fields(messages = messages.len()))]
    pub async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: ChatOptions,
    ) -> AppResult<ChatResponse> {
        let params = options.into_parameters(String::new(), system_prompt);
        self.platform.chat_with_history(messages, &params).await
    }

    /// Describe an image read from `reader`
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails, the image is empty, or the
    /// platform does not support image description.
    pub async fn describe_image<R>(
        &self,
        mut reader: R,
        file_name: &str,
        prompt: &str,
        system_prompt: &str,
    ) -> AppResult<DescribeImageResponse>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut image = Vec::new();
        reader
            .read_to_end(&mut image)
            .await
            .map_err(|e| AppError::invalid_input(format!("Failed to read image {file_name}: {e}")))?;

        let params = DescribeImageParameters {
            chat: ChatParameters::new(prompt).with_system_prompt(system_prompt),
            file_name: file_name.to_owned(),
            image,
        };
        self.platform.describe_image(&params).await
    }

    /// Describe the configured platform and its models
    ///
    /// A failed model listing yields an empty model list.
    pub async fn info(&self) -> LlmInfo {
        let models = match self.platform.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Failed to list models: {e}");
                Vec::new()
            }
        };

        LlmInfo {
            platforms: vec![PlatformInfo {
                name: self.platform.platform_type().to_string(),
                is_default: true,
                models,
            }],
        }
    }

    /// Delete expired cache entries; zero when caching is off
    ///
    /// # Errors
    ///
    /// Returns an error if the storage sweep fails.
    pub async fn clean_expired(&self) -> AppResult<u64> {
        match &self.storage {
            Some(storage) => storage.clean_expired().await,
            None => Ok(0),
        }
    }
}
