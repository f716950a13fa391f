// ABOUTME: Local inference platform backed by an Ollama server with an optional fallback endpoint
// ABOUTME: Lazily builds clients, retries once against the fallback, and reports zero cost
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Ollama Platform
//!
//! Local inference over the native Ollama API.
//!
//! ## Fallback
//!
//! When a call against the primary endpoint fails for any reason other than
//! local validation, and `fallback_url` is configured, the same request is
//! sent once to the fallback endpoint. This is a sequential retry after the
//! primary attempt has finished or timed out, never a race.
//!
//! ## Token accounting
//!
//! Single-turn chat estimates tokens with [`estimate_tokens`]; history chat
//! uses the server's `prompt_eval_count`/`eval_count`. Cost is always zero.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

use super::ollama_client::{
    HttpOllamaClient, OllamaChatRequest, OllamaChatResponse, OllamaClient, OllamaMessage,
    OllamaModel, PLATFORM,
};
use super::{
    estimate_tokens, format_size, mark_default, require_messages, require_prompt, sort_models,
    ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse,
    ModelInfo, Platform, PlatformType, Usage,
};
use crate::config::OllamaConfig;
use crate::errors::{AppError, AppResult, LlmError};

/// Local inference platform
pub struct OllamaPlatform {
    config: OllamaConfig,
    primary: OnceCell<Arc<dyn OllamaClient>>,
    fallback: OnceCell<Arc<dyn OllamaClient>>,
}

impl OllamaPlatform {
    /// Create the platform from configuration
    ///
    /// The primary client is built eagerly; if that fails the error is logged
    /// and construction is retried on first use.
    #[must_use]
    pub fn new(config: OllamaConfig) -> Self {
        info!(
            url = %config.url,
            fallback = config.fallback_url.as_deref().unwrap_or("none"),
            model = %config.model,
            "Creating Ollama platform"
        );

        let primary = match HttpOllamaClient::new(&config.url, &config) {
            Ok(client) => OnceCell::new_with(Some(Arc::new(client) as Arc<dyn OllamaClient>)),
            Err(e) => {
                error!("Failed to create Ollama client, will retry on first use: {e}");
                OnceCell::new()
            }
        };

        Self {
            config,
            primary,
            fallback: OnceCell::new(),
        }
    }

    /// Create the platform with pre-built clients
    #[must_use]
    pub fn with_clients(
        config: OllamaConfig,
        primary: Arc<dyn OllamaClient>,
        fallback: Option<Arc<dyn OllamaClient>>,
    ) -> Self {
        Self {
            config,
            primary: OnceCell::new_with(Some(primary)),
            fallback: OnceCell::new_with(fallback),
        }
    }

    async fn primary_client(&self) -> Result<&Arc<dyn OllamaClient>, LlmError> {
        self.primary
            .get_or_try_init(|| async {
                HttpOllamaClient::new(&self.config.url, &self.config)
                    .map(|client| Arc::new(client) as Arc<dyn OllamaClient>)
            })
            .await
    }

    async fn fallback_client(&self) -> Result<Option<&Arc<dyn OllamaClient>>, LlmError> {
        let Some(url) = self.config.fallback_url.as_deref() else {
            return Ok(self.fallback.get());
        };
        self.fallback
            .get_or_try_init(|| async {
                HttpOllamaClient::new(url, &self.config)
                    .map(|client| Arc::new(client) as Arc<dyn OllamaClient>)
            })
            .await
            .map(Some)
    }

    /// Send a chat request to the primary endpoint, retrying once on the fallback
    async fn send_chat(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError> {
        let primary_result = match self.primary_client().await {
            Ok(client) => client.chat(request).await,
            Err(e) => Err(e),
        };

        let primary_error = match primary_result {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        let Some(fallback) = self.fallback_client().await? else {
            return Err(primary_error);
        };

        warn!(
            primary = %self.config.url,
            fallback = %fallback.base_url(),
            error = %primary_error,
            "Primary Ollama URL failed, attempting fallback"
        );

        fallback.chat(request).await.map_err(|fallback_error| {
            error!(
                fallback = %fallback.base_url(),
                "Fallback Ollama URL failed: {fallback_error}"
            );
            fallback_error
        })
    }

    async fn fetch_models(&self) -> Result<Vec<OllamaModel>, LlmError> {
        let primary_error = match self.primary_client().await {
            Ok(client) => match client.list_models().await {
                Ok(models) => return Ok(models),
                Err(e) => e,
            },
            Err(e) => e,
        };

        match self.fallback_client().await? {
            Some(fallback) => {
                warn!(
                    fallback = %fallback.base_url(),
                    error = %primary_error,
                    "Listing models on primary Ollama URL failed, attempting fallback"
                );
                fallback.list_models().await
            }
            None => Err(primary_error),
        }
    }

    fn build_messages(system_prompt: &str, messages: &[ChatMessage]) -> Vec<OllamaMessage> {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            api_messages.push(OllamaMessage {
                role: "system".to_owned(),
                content: system_prompt.to_owned(),
            });
        }
        api_messages.extend(messages.iter().map(|msg| OllamaMessage {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }));
        api_messages
    }
}

#[async_trait]
impl Platform for OllamaPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Ollama
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, params), fields(platform = PLATFORM))]
    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        require_prompt(params)?;
        let model = params.resolve_model(&self.config.model, PLATFORM)?;

        let request = OllamaChatRequest {
            model: model.clone(),
            messages: Self::build_messages(
                &params.system_prompt,
                &[ChatMessage::user(params.prompt.clone())],
            ),
            stream: false,
        };

        debug!(
            model = %model,
            has_system_prompt = !params.system_prompt.is_empty(),
            "Sending request to Ollama"
        );

        let response = self
            .send_chat(&request)
            .await
            .map_err(|e| AppError::from(e).with_model(&model))?;

        let text = response.message.content;
        let usage = Usage::new(
            model,
            estimate_tokens(&params.prompt),
            estimate_tokens(&text),
        );

        debug!(
            estimated_total_tokens = usage.total_tokens,
            "Ollama chat response received"
        );

        Ok(ChatResponse { text, usage })
    }

    #[instrument(skip(self, messages, params), fields(platform = PLATFORM, messages = messages.len()))]
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse> {
        require_messages(messages)?;
        let model = params.resolve_model(&self.config.model, PLATFORM)?;

        let request = OllamaChatRequest {
            model: model.clone(),
            messages: Self::build_messages(&params.system_prompt, messages),
            stream: false,
        };

        let response = self
            .send_chat(&request)
            .await
            .map_err(|e| AppError::from(e).with_model(&model))?;

        let usage = Usage::new(
            model,
            response.prompt_eval_count.unwrap_or_default(),
            response.eval_count.unwrap_or_default(),
        );

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Ollama chat with history response received"
        );

        Ok(ChatResponse {
            text: response.message.content,
            usage,
        })
    }

    async fn describe_image(
        &self,
        _params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        Err(LlmError::not_implemented(PLATFORM, "describe_image").into())
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        let mut models: Vec<ModelInfo> = self
            .fetch_models()
            .await?
            .into_iter()
            .map(|model| ModelInfo {
                size_human: format_size(model.size),
                name: model.name,
                is_default: false,
            })
            .collect();

        mark_default(&mut models, &self.config.model);
        sort_models(&mut models);
        Ok(models)
    }
}
