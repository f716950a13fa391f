// ABOUTME: Conversation and message records for the chat manager
// ABOUTME: Role-tagged messages with dense per-conversation ordering and running totals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Usage;
use crate::errors::AppError;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction
    System,
    /// End-user turn
    User,
    /// Model reply
    Assistant,
}

impl ChatRole {
    /// Wire/storage representation of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(AppError::invalid_input(format!("unknown chat role: {other}"))),
        }
    }
}

/// A role/content pair sent to a platform as conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an explicit role
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// One persisted turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItem {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub chat_id: String,
    /// Role of the sender
    pub role: ChatRole,
    /// Message text
    pub content: String,
    /// Usage of the model call that produced this message (assistant turns)
    pub usage: Option<Usage>,
    /// Dense zero-based position within the conversation
    pub order: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatItem> for ChatMessage {
    fn from(item: &ChatItem) -> Self {
        Self::new(item.role, item.content.clone())
    }
}

/// A conversation with running token/cost totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Unique conversation ID
    pub id: String,
    /// Owner of the conversation
    pub owner_id: String,
    /// Display label
    pub label: String,
    /// System prompt applied to every completion (empty for none)
    pub system_prompt: String,
    /// Model pinned to the conversation (empty to use the service default)
    pub model: String,
    /// Running sum of assistant-turn tokens
    pub total_tokens: i64,
    /// Running sum of assistant-turn cost
    pub total_cost: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last activity time
    pub updated_at: DateTime<Utc>,
    /// Messages, loaded lazily
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ChatItem>,
}
