// ABOUTME: Domain service layer built on the LLM gateway and the chat repository
// ABOUTME: Conversation management plus the outcome type for best-effort side effects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! Domain service layer

/// Conversation lifecycle and completion orchestration
pub mod chat_manager;

/// Primary value plus non-fatal diagnostics
pub mod outcome;

pub use chat_manager::{ChatManager, CompletionResult};
pub use outcome::{Diagnostic, Outcome, Step};
