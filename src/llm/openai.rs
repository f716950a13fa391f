// ABOUTME: Hosted OpenAI-compatible platform with metered cost accounting
// ABOUTME: Chat, history chat, vision description, and allow-listed model catalog
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # `OpenAI` Platform
//!
//! Hosted backend speaking the `OpenAI` chat completions API.
//!
//! ## Configuration
//!
//! - `OPENAI_API_KEY`: Bearer token (required)
//! - `OPENAI_MODEL`: Default model (default: `gpt-4o-mini`)
//! - `OPENAI_BASE_URL`: Base URL (default: <https://api.openai.com/v1>)
//! - `OPENAI_ALLOWED_MODELS`: Comma-separated catalog allow-list
//!
//! Cost is computed as `total_tokens * cost_per_million_tokens / 1_000_000`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use glimmer_core::constants::llm::{DEFAULT_IMAGE_PROMPT, OPENAI_CONNECT_TIMEOUT_SECS};

use super::{
    mark_default, require_messages, require_prompt, sort_models, ChatMessage, ChatParameters,
    ChatResponse, DescribeImageParameters, DescribeImageResponse, ModelInfo, Platform,
    PlatformType, Usage,
};
use crate::config::OpenAiConfig;
use crate::errors::{AppError, AppResult, LlmError};

/// Platform name used in errors and logs
const PLATFORM: &str = "openai";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: OpenAiContent,
}

/// Plain text for chat turns, typed parts for vision requests
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiImageUrl {
    url: String,
}

impl OpenAiMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: OpenAiContent::Text(content.to_owned()),
        }
    }
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self::text(msg.role.as_str(), &msg.content)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModelEntry>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// Platform Implementation
// ============================================================================

/// Hosted `OpenAI`-compatible platform
pub struct OpenAiPlatform {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiPlatform {
    /// Create the platform from configuration
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` without an API key, or an internal error if
    /// the HTTP client cannot be created.
    pub fn new(config: OpenAiConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::config_missing(OpenAiConfig::API_KEY_ENV))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(OPENAI_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            allowed_models = config.allowed_models.len(),
            "Creating OpenAI platform"
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .timeout(self.config.timeout())
    }

    fn cost_for(&self, total_tokens: u32) -> f64 {
        f64::from(total_tokens) * self.config.cost_per_million_tokens / 1_000_000.0
    }

    /// Map a non-success response to a structured error
    fn parse_error_response(status: StatusCode, body: &str) -> LlmError {
        let message = serde_json::from_str::<OpenAiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| parsed.error.message,
        );

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LlmError::InvalidCredentials { platform: PLATFORM }
            }
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                platform: PLATFORM,
                message,
            },
            _ => LlmError::Api {
                platform: PLATFORM,
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn read_body(response: reqwest::Response, url: &str) -> Result<String, LlmError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(PLATFORM, url, &e))?;
        if !status.is_success() {
            error!(status = status.as_u16(), "OpenAI request to {url} failed");
            return Err(Self::parse_error_response(status, &body));
        }
        Ok(body)
    }

    /// Issue a chat completion and convert the result into text plus usage
    async fn complete(
        &self,
        model: String,
        messages: Vec<OpenAiMessage>,
    ) -> Result<(String, Usage), LlmError> {
        let url = self.api_url("chat/completions");
        debug!(model = %model, messages = messages.len(), "Sending chat completion request");

        let request = OpenAiRequest { model, messages };
        let response = self
            .authorized(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to {url}: {e}");
                LlmError::from_reqwest(PLATFORM, &url, &e)
            })?;

        let body = Self::read_body(response, &url).await?;
        let parsed: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse OpenAI response: {e} - body: {}",
                body.chars().take(500).collect::<String>()
            );
            LlmError::invalid_response(PLATFORM, e.to_string())
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::invalid_response(PLATFORM, "API returned no choices"))?;

        let (prompt, completion) = parsed
            .usage
            .map_or((0, 0), |u| (u.prompt, u.completion));
        let usage = Usage::new(request.model, prompt, completion);
        let cost = self.cost_for(usage.total_tokens);

        Ok((text, usage.with_cost(cost)))
    }

    fn image_data_url(file_name: &str, image: &[u8]) -> String {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mime = match extension.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "image/jpeg",
        };
        format!("data:{mime};base64,{}", BASE64.encode(image))
    }
}

#[async_trait]
impl Platform for OpenAiPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::OpenAi
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, params), fields(platform = PLATFORM))]
    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        require_prompt(params)?;
        let model = params.resolve_model(&self.config.model, PLATFORM)?;

        let mut messages = Vec::with_capacity(2);
        if !params.system_prompt.is_empty() {
            messages.push(OpenAiMessage::text("system", &params.system_prompt));
        }
        messages.push(OpenAiMessage::text("user", &params.prompt));

        let (text, usage) = self
            .complete(model.clone(), messages)
            .await
            .map_err(|e| AppError::from(e).with_model(model))?;
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

        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if !params.system_prompt.is_empty() {
            api_messages.push(OpenAiMessage::text("system", &params.system_prompt));
        }
        api_messages.extend(messages.iter().map(OpenAiMessage::from));

        let (text, usage) = self
            .complete(model.clone(), api_messages)
            .await
            .map_err(|e| AppError::from(e).with_model(model))?;
        Ok(ChatResponse { text, usage })
    }

    #[instrument(skip(self, params), fields(platform = PLATFORM, file = %params.file_name))]
    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        if params.image.is_empty() {
            return Err(LlmError::MissingImage.into());
        }
        let model = params.chat.resolve_model(&self.config.model, PLATFORM)?;

        let prompt = if params.chat.prompt.is_empty() {
            DEFAULT_IMAGE_PROMPT
        } else {
            params.chat.prompt.as_str()
        };

        let mut messages = Vec::with_capacity(2);
        if !params.chat.system_prompt.is_empty() {
            messages.push(OpenAiMessage::text("system", &params.chat.system_prompt));
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: OpenAiContent::Parts(vec![
                OpenAiContentPart::Text {
                    text: prompt.to_owned(),
                },
                OpenAiContentPart::ImageUrl {
                    image_url: OpenAiImageUrl {
                        url: Self::image_data_url(&params.file_name, &params.image),
                    },
                },
            ]),
        });

        let (text, usage) = self
            .complete(model.clone(), messages)
            .await
            .map_err(|e| AppError::from(e).with_model(model))?;
        Ok(DescribeImageResponse { text, usage })
    }

    /// Fails closed: invalid credentials surface as an error, never an empty catalog
    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        let url = self.api_url("models");
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(PLATFORM, &url, &e))?;

        let body = Self::read_body(response, &url).await?;
        let catalog: OpenAiModelList = serde_json::from_str(&body)
            .map_err(|e| LlmError::invalid_response(PLATFORM, e.to_string()))?;

        let mut models: Vec<ModelInfo> = catalog
            .data
            .into_iter()
            .filter(|entry| self.config.allowed_models.contains(&entry.id))
            .map(|entry| ModelInfo {
                name: entry.id,
                size_human: String::new(),
                is_default: false,
            })
            .collect();

        mark_default(&mut models, &self.config.model);
        sort_models(&mut models);
        Ok(models)
    }
}
