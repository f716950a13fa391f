// ABOUTME: Core data models for usage accounting and conversations
// ABOUTME: Re-exports Usage, ChatRole, ChatMessage, Chat, and ChatItem
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

/// Conversation and message records
pub mod chat;
/// Token and cost accounting for one model call
pub mod usage;

pub use chat::{Chat, ChatItem, ChatMessage, ChatRole};
pub use usage::Usage;
