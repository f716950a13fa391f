// ABOUTME: Conversation defaults and paging limits for the chat manager
// ABOUTME: Labels, list sizes, and the recent-message window used for context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

/// Label given to conversations created without one
pub const DEFAULT_CHAT_LABEL: &str = "New chat";

/// Default page size when listing conversations
pub const DEFAULT_CHATS_LIMIT: u32 = 10;

/// Default page size when listing messages of a conversation
pub const DEFAULT_MESSAGES_LIMIT: u32 = 50;

/// Number of most recent messages loaded with a conversation
pub const CHAT_ITEMS_WINDOW: u32 = 100;

/// Maximum characters of the last user message shown in echo history previews
pub const PREVIEW_MAX_CHARS: usize = 50;
