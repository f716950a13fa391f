// ABOUTME: Core types and constants for the Glimmer LLM gateway
// ABOUTME: Foundation crate with error handling, usage accounting, and conversation models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

#![deny(unsafe_code)]

//! # Glimmer Core
//!
//! Foundation crate providing shared types and constants for the Glimmer LLM
//! gateway. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and the gateway's `LlmError`
//! - **constants**: Timeouts, TTLs, default models, and paging limits
//! - **models**: `Usage`, `Chat`, `ChatItem`, and `ChatRole`

/// Unified error handling system with standard error codes
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (usage accounting, conversations, messages)
pub mod models;
