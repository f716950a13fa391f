// ABOUTME: Deterministic SHA-256 cache-key derivation for chat, history, and image calls
// ABOUTME: Hashes only semantic inputs with length-prefixed fields so boundaries cannot collide
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Cache Keys
//!
//! Keys are hex SHA-256 digests over the prompt (or every message's role and
//! content, in order), the system prompt, and the effective model name.
//! Each field is prefixed with its byte length, so `("ab", "c")` and
//! `("a", "bc")` hash differently. Timestamps and cache flags never enter
//! the digest.

use glimmer_core::constants::cache::{HISTORY_ENTRY_SEPARATOR, HISTORY_KEY_PREFIX, IMAGE_KEY_PREFIX};
use sha2::{Digest, Sha256};

use crate::llm::ChatMessage;

/// Incremental digest over length-prefixed fields
struct KeyHasher(Sha256);

impl KeyHasher {
    fn new(kind: &str) -> Self {
        let mut hasher = Self(Sha256::new());
        hasher.field(kind.as_bytes());
        hasher
    }

    fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
        self
    }

    fn finish(self) -> String {
        hex::encode(self.0.finalize())
    }
}

/// Key for a single-turn chat call
#[must_use]
pub fn chat_key(prompt: &str, system_prompt: &str, model: &str) -> String {
    let mut hasher = KeyHasher::new("chat");
    hasher
        .field(prompt.as_bytes())
        .field(system_prompt.as_bytes())
        .field(model.as_bytes());
    hasher.finish()
}

/// Key for a chat-with-history call
///
/// Message order is significant: reordering messages changes the key.
#[must_use]
pub fn history_key(messages: &[ChatMessage], system_prompt: &str, model: &str) -> String {
    let mut hasher = KeyHasher::new("history");
    hasher.field(&(messages.len() as u64).to_be_bytes());
    for message in messages {
        hasher
            .field(message.role.as_str().as_bytes())
            .field(message.content.as_bytes());
    }
    hasher
        .field(system_prompt.as_bytes())
        .field(model.as_bytes());
    format!("{HISTORY_KEY_PREFIX}{}", hasher.finish())
}

/// Key for an image description call, content-addressed by the image bytes
#[must_use]
pub fn image_key(image: &[u8], prompt: &str, system_prompt: &str, model: &str) -> String {
    let mut hasher = KeyHasher::new("image");
    hasher
        .field(image)
        .field(prompt.as_bytes())
        .field(system_prompt.as_bytes())
        .field(model.as_bytes());
    format!("{IMAGE_KEY_PREFIX}{}", hasher.finish())
}

/// Condense a message sequence into `role:content` pairs joined by `|`
///
/// Used as the single synthetic prompt of a persisted history entry.
/// Backslash, `:` and `|` inside content are escaped with a backslash, so
/// distinct sequences always condense to distinct strings.
#[must_use]
pub fn history_key_material(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:{}", m.role, escape_material(&m.content)))
        .collect::<Vec<_>>()
        .join(&HISTORY_ENTRY_SEPARATOR.to_string())
}

fn escape_material(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for c in content.chars() {
        if matches!(c, '\\' | ':') || c == HISTORY_ENTRY_SEPARATOR {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
