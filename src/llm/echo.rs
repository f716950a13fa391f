// ABOUTME: Deterministic echo platform for tests and offline development
// ABOUTME: Reflects the structure of its input back with zero cost and estimated tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use async_trait::async_trait;

use glimmer_core::constants::chat::PREVIEW_MAX_CHARS;
use glimmer_core::constants::llm::{ECHO_IMAGE_TOKENS, ECHO_MODEL, ECHO_TOKENS_PER_MESSAGE};

use super::{
    estimate_tokens, require_messages, require_prompt, ChatMessage, ChatParameters, ChatResponse,
    ChatRole, DescribeImageParameters, DescribeImageResponse, ModelInfo, Platform, PlatformType,
    Usage,
};
use crate::errors::{AppResult, LlmError};

/// Echo platform: no network, no cost, fully deterministic
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoPlatform;

impl EchoPlatform {
    /// Create the echo platform
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn preview(text: &str) -> String {
        if text.chars().count() > PREVIEW_MAX_CHARS {
            let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
            format!("{truncated}...")
        } else {
            text.to_owned()
        }
    }
}

#[async_trait]
impl Platform for EchoPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Echo
    }

    fn default_model(&self) -> &str {
        ECHO_MODEL
    }

    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        require_prompt(params)?;
        let model = params.resolve_model(ECHO_MODEL, "echo")?;

        let text = format!(
            "Echo response to: {}\nSystem context: {}",
            params.prompt, params.system_prompt
        );
        let usage = Usage::new(model, estimate_tokens(&params.prompt), estimate_tokens(&text));

        Ok(ChatResponse { text, usage })
    }

    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse> {
        require_messages(messages)?;
        let model = params.resolve_model(ECHO_MODEL, "echo")?;

        let count = |role: ChatRole| messages.iter().filter(|m| m.role == role).count();
        let mut lines = vec![
            format!(
                "Echo response to message history with {} total messages:",
                messages.len()
            ),
            format!("- {} user messages", count(ChatRole::User)),
            format!("- {} assistant messages", count(ChatRole::Assistant)),
            format!("- {} system messages", count(ChatRole::System)),
        ];

        if !params.system_prompt.is_empty() {
            lines.push(format!("\nSystem prompt: {}", params.system_prompt));
        }

        if let Some(last_user) = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User && !m.content.is_empty())
        {
            lines.push(format!(
                "\nLast user message: {}",
                Self::preview(&last_user.content)
            ));
        }

        let text = lines.join("\n");
        let prompt_tokens =
            u32::try_from(messages.len()).unwrap_or(u32::MAX).saturating_mul(ECHO_TOKENS_PER_MESSAGE);
        let usage = Usage::new(model, prompt_tokens, estimate_tokens(&text));

        Ok(ChatResponse { text, usage })
    }

    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        if params.image.is_empty() {
            return Err(LlmError::MissingImage.into());
        }
        let model = params.chat.resolve_model(ECHO_MODEL, "echo")?;

        let text = format!(
            "[ECHO] Image filename: {}\n\nSystem: {}\n\nPrompt: {}",
            params.file_name, params.chat.system_prompt, params.chat.prompt
        );
        let prompt_tokens = estimate_tokens(&params.chat.prompt).saturating_add(ECHO_IMAGE_TOKENS);
        let usage = Usage::new(model, prompt_tokens, estimate_tokens(&text));

        Ok(DescribeImageResponse { text, usage })
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            name: ECHO_MODEL.to_owned(),
            size_human: String::new(),
            is_default: true,
        }])
    }
}
