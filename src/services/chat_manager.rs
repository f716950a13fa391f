// ABOUTME: Conversation manager threading multi-turn history through the LLM service
// ABOUTME: Orders messages, accumulates usage totals, and falls back to single-turn chat
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Chat Manager
//!
//! Primary writes (creating a conversation, appending the user message, and
//! the model call itself) propagate their errors. Everything else is
//! recorded as a [`Diagnostic`](super::outcome::Diagnostic) on the returned
//! [`Outcome`] and logged, so a generated reply is never lost to a failed
//! timestamp update or running-total refresh.

use std::sync::Arc;

use glimmer_core::constants::chat::{
    CHAT_ITEMS_WINDOW, DEFAULT_CHATS_LIMIT, DEFAULT_CHAT_LABEL, DEFAULT_MESSAGES_LIMIT,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::outcome::{Outcome, Step};
use crate::database::{ChatRepository, Database, SqliteChatRepository};
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, ChatOptions, ChatRole, LlmService, Usage};
use glimmer_core::models::{Chat, ChatItem};

/// Result of one completion turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// Generated reply
    pub text: String,
    /// Usage of the model call
    pub usage: Usage,
    /// Model the call was made with
    pub model: String,
    /// The persisted user message
    pub user_item: ChatItem,
    /// The persisted assistant message, if persisting it succeeded
    pub assistant_item: Option<ChatItem>,
    /// Whether the reply came from history-aware chat
    pub used_history: bool,
}

/// Conversation manager
#[derive(Clone)]
pub struct ChatManager {
    repo: Arc<dyn ChatRepository>,
    llm: Arc<LlmService>,
}

impl ChatManager {
    /// Create a manager over an arbitrary repository
    #[must_use]
    pub fn new(repo: Arc<dyn ChatRepository>, llm: Arc<LlmService>) -> Self {
        Self { repo, llm }
    }

    /// Create a manager backed by the `SQLite` chat tables
    #[must_use]
    pub fn from_database(database: &Database, llm: Arc<LlmService>) -> Self {
        Self::new(
            Arc::new(SqliteChatRepository::new(database.pool().clone())),
            llm,
        )
    }

    /// The LLM service used for completions
    #[must_use]
    pub fn llm(&self) -> &Arc<LlmService> {
        &self.llm
    }

    fn require(value: &str, field: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            Err(AppError::missing_field(field))
        } else {
            Ok(())
        }
    }

    async fn load_chat(&self, chat_id: &str) -> AppResult<Chat> {
        self.repo
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Chat {chat_id}")).with_resource_id(chat_id))
    }

    /// Create a conversation, storing a non-empty system prompt as its first message
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for an empty owner and database errors
    /// if the conversation cannot be inserted.
    #[instrument(skip(self, system_prompt))]
    pub async fn create_chat(
        &self,
        owner_id: &str,
        system_prompt: &str,
        model: &str,
    ) -> AppResult<Outcome<Chat>> {
        Self::require(owner_id, "owner_id")?;

        let chat = self
            .repo
            .create_chat(owner_id, DEFAULT_CHAT_LABEL, system_prompt, model)
            .await?;
        let mut outcome = Outcome::new(chat);

        if !system_prompt.is_empty() {
            match self
                .repo
                .append_item(&outcome.value.id, ChatRole::System, system_prompt, None)
                .await
            {
                Ok(item) => outcome.value.items.push(item),
                Err(e) => outcome.record(Step::SystemPrompt, &e),
            }
        }

        info!(chat_id = %outcome.value.id, "Created chat");
        Ok(outcome)
    }

    /// Load a conversation with its most recent messages
    ///
    /// A failure to load messages yields the conversation with no items.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown conversation.
    pub async fn get_chat(&self, chat_id: &str) -> AppResult<Outcome<Chat>> {
        Self::require(chat_id, "chat_id")?;

        let mut outcome = Outcome::new(self.load_chat(chat_id).await?);
        match self.repo.recent_items(chat_id, CHAT_ITEMS_WINDOW).await {
            Ok(items) => outcome.value.items = items,
            Err(e) => outcome.record(Step::LoadItems, &e),
        }
        Ok(outcome)
    }

    /// List an owner's conversations, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for an empty owner and database errors.
    pub async fn get_chats(
        &self,
        owner_id: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> AppResult<Vec<Chat>> {
        Self::require(owner_id, "owner_id")?;
        self.repo
            .list_chats(owner_id, limit.unwrap_or(DEFAULT_CHATS_LIMIT), offset)
            .await
    }

    /// Rename a conversation
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for an empty ID or label and
    /// `RESOURCE_NOT_FOUND` for an unknown conversation.
    pub async fn update_chat_label(&self, chat_id: &str, label: &str) -> AppResult<()> {
        Self::require(chat_id, "chat_id")?;
        Self::require(label, "label")?;

        if self.repo.update_label(chat_id, label).await? {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Chat {chat_id}")).with_resource_id(chat_id))
        }
    }

    /// Append a message at the next order and touch the conversation
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for an empty ID and database errors
    /// if the message cannot be inserted.
    pub async fn add_chat_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        usage: Option<&Usage>,
    ) -> AppResult<Outcome<ChatItem>> {
        Self::require(chat_id, "chat_id")?;

        let item = self.repo.append_item(chat_id, role, content, usage).await?;
        let mut outcome = Outcome::new(item);

        if let Err(e) = self.repo.touch(chat_id).await {
            outcome.record(Step::Touch, &e);
        }
        Ok(outcome)
    }

    /// Page through a conversation's messages in ascending order
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` for an empty ID and database errors.
    pub async fn get_chat_messages(
        &self,
        chat_id: &str,
        limit: Option<u32>,
        offset: u32,
    ) -> AppResult<Vec<ChatItem>> {
        Self::require(chat_id, "chat_id")?;
        self.repo
            .list_items(chat_id, limit.unwrap_or(DEFAULT_MESSAGES_LIMIT), offset)
            .await
    }

    /// Run one completion turn of a conversation
    ///
    /// The model is the explicit option, else the conversation's model, else
    /// the service default, else the first model the service lists.
    /// History-aware chat is tried first; if it fails,
    /// or prior messages cannot be loaded, single-turn chat with only
    /// `message` is used.
    ///
    /// # Errors
    ///
    /// Returns validation errors for an empty ID or message,
    /// `RESOURCE_NOT_FOUND` for an unknown conversation, database errors if
    /// the user message cannot be stored, and backend errors if the model
    /// call fails.
    #[instrument(skip(self, message, options))]
    pub async fn chat_completion(
        &self,
        chat_id: &str,
        message: &str,
        mut options: ChatOptions,
    ) -> AppResult<Outcome<CompletionResult>> {
        Self::require(chat_id, "chat_id")?;
        Self::require(message, "message")?;

        let chat = self.load_chat(chat_id).await?;
        let model = self.resolve_model(&chat, &options).await;
        options.model = Some(model.clone());

        let mut diagnostics = Outcome::new(());
        let user_item = self
            .add_chat_message(chat_id, ChatRole::User, message, None)
            .await?;
        let user_item = diagnostics.absorb(user_item);

        let history = match self.repo.recent_items(chat_id, CHAT_ITEMS_WINDOW).await {
            Ok(items) => Self::context_messages(&chat, &items),
            Err(e) => {
                diagnostics.record(Step::HistoryFetch, &e);
                Vec::new()
            }
        };

        let (response, used_history) = if history.is_empty() {
            (
                self.llm
                    .chat(message, &chat.system_prompt, options)
                    .await?,
                false,
            )
        } else {
            match self
                .llm
                .chat_with_history(&history, &chat.system_prompt, options.clone())
                .await
            {
                Ok(response) => (response, true),
                Err(e) => {
                    diagnostics.record(Step::HistoryChat, &e);
                    (
                        self.llm
                            .chat(message, &chat.system_prompt, options)
                            .await?,
                        false,
                    )
                }
            }
        };

        let assistant_item = match self
            .repo
            .append_item(
                chat_id,
                ChatRole::Assistant,
                &response.text,
                Some(&response.usage),
            )
            .await
        {
            Ok(item) => Some(item),
            Err(e) => {
                diagnostics.record(Step::AssistantMessage, &e);
                None
            }
        };

        if let Err(e) = self.repo.add_usage(chat_id, &response.usage).await {
            diagnostics.record(Step::UsageTotals, &e);
        }

        debug!(
            chat_id,
            model = %model,
            used_history,
            total_tokens = response.usage.total_tokens,
            cache_hit = response.usage.cache_hit,
            "Chat completion finished"
        );

        Ok(Outcome {
            value: CompletionResult {
                text: response.text,
                usage: response.usage,
                model,
                user_item,
                assistant_item,
                used_history,
            },
            diagnostics: diagnostics.diagnostics,
        })
    }

    /// Explicit option, then the conversation's model, then the service default
    ///
    /// A service without a configured default falls back to the first model
    /// it lists.
    async fn resolve_model(&self, chat: &Chat, options: &ChatOptions) -> String {
        let chosen = options
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(chat.model.as_str()).filter(|m| !m.is_empty()))
            .or_else(|| Some(self.llm.default_model()).filter(|m| !m.is_empty()));
        if let Some(model) = chosen {
            return model.to_owned();
        }

        let listed = self
            .llm
            .info()
            .await
            .platforms
            .into_iter()
            .flat_map(|platform| platform.models)
            .map(|model| model.name)
            .next()
            .unwrap_or_default();
        debug!(model = %listed, "No default model configured, using first listed model");
        listed
    }

    /// Prior messages as model context
    ///
    /// When the conversation has a system prompt it is sent separately, so
    /// stored system messages are left out.
    fn context_messages(chat: &Chat, items: &[ChatItem]) -> Vec<ChatMessage> {
        items
            .iter()
            .filter(|item| chat.system_prompt.is_empty() || item.role != ChatRole::System)
            .map(ChatMessage::from)
            .collect()
    }
}
