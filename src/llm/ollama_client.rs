// ABOUTME: HTTP client for the Ollama local inference API (/api/chat and /api/tags)
// ABOUTME: Per-call timeouts, bounded idle pool, and structured transport/API errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Ollama Client
//!
//! Thin wrapper over the native Ollama REST API. The [`OllamaClient`] trait is
//! the seam the platform uses for primary/fallback dispatch; tests can supply
//! their own implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::OllamaConfig;
use crate::errors::LlmError;

/// Platform name used in errors and logs
pub(crate) const PLATFORM: &str = "ollama";

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Message in Ollama's chat format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaMessage {
    /// `system`, `user`, or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Request body for `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    /// Model to run
    pub model: String,
    /// Conversation, system message first when present
    pub messages: Vec<OllamaMessage>,
    /// Always `false`; responses are read whole
    pub stream: bool,
}

/// Response body of `POST /api/chat` with `stream: false`
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatResponse {
    /// Model that answered
    #[serde(default)]
    pub model: String,
    /// Generated message
    pub message: OllamaMessage,
    /// Tokens evaluated for the prompt
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// One entry of `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    /// Model tag, e.g. `llama3.2:1b`
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

// ============================================================================
// Client Trait
// ============================================================================

/// Operations the local inference platform needs from a server
#[async_trait]
pub trait OllamaClient: Send + Sync {
    /// Endpoint this client talks to
    fn base_url(&self) -> &str;

    /// Run a non-streaming chat completion
    async fn chat(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError>;

    /// List locally available models
    async fn list_models(&self) -> Result<Vec<OllamaModel>, LlmError>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// `reqwest`-backed Ollama client
pub struct HttpOllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpOllamaClient {
    /// Create a client for `base_url` using the pool and timeout settings in `config`
    ///
    /// The request timeout is attached to every call rather than to the
    /// client, so each call gets its own deadline.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be created.
    pub fn new(base_url: &str, config: &OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.max_idle_connections)
            .build()
            .map_err(|e| {
                LlmError::transport(
                    PLATFORM,
                    base_url,
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: config.timeout(),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}", self.base_url)
    }

    /// Map a non-success response to an API error, preferring Ollama's `{"error": ...}` body
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> LlmError {
        let message = serde_json::from_str::<OllamaErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| parsed.error,
        );
        LlmError::Api {
            platform: PLATFORM,
            status: status.as_u16(),
            message,
        }
    }

    async fn read_body(response: reqwest::Response, url: &str) -> Result<String, LlmError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read Ollama response from {url}: {e}");
            LlmError::from_reqwest(PLATFORM, url, &e)
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl OllamaClient for HttpOllamaClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError> {
        let url = self.api_url("chat");
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat request to {url}"
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to {url}: {e}");
                LlmError::from_reqwest(PLATFORM, &url, &e)
            })?;

        let body = Self::read_body(response, &url).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(
                "Failed to parse Ollama chat response: {e} - body: {}",
                body.chars().take(500).collect::<String>()
            );
            LlmError::invalid_response(PLATFORM, e.to_string())
        })
    }

    async fn list_models(&self) -> Result<Vec<OllamaModel>, LlmError> {
        let url = self.api_url("tags");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(PLATFORM, &url, &e))?;

        let body = Self::read_body(response, &url).await?;
        let tags: OllamaTagsResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::invalid_response(PLATFORM, e.to_string()))?;
        Ok(tags.models)
    }
}
