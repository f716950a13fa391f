// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Timeouts, TTLs, default models, and paging limits for the gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! Constants module
//!
//! Defaults are passed into constructors through configuration structs; nothing
//! here is mutable state.

/// Cache-related constants (TTL per call kind, key prefixes, persisted field limits)
pub mod cache;
/// Conversation defaults and paging limits
pub mod chat;
/// Backend defaults (endpoints, models, timeouts, pricing)
pub mod llm;
