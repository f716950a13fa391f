// ABOUTME: Configuration module for the LLM gateway
// ABOUTME: Environment-only configuration for backends, caching, and persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! Configuration is read from the environment once, at startup, and passed to
//! constructors as plain structs. Nothing below `config` reads the environment.

/// Response cache configuration
pub mod cache;
/// Database connection configuration
pub mod database;
/// Backend selection, credentials, and endpoints
pub mod llm;
/// Backend and cache selection enums
pub mod types;

pub use cache::{CacheConfig, CacheTtlConfig};
pub use database::DatabaseConfig;
pub use llm::{LlmConfig, OllamaConfig, OpenAiConfig};
pub use types::{CacheBackend, PlatformType};
