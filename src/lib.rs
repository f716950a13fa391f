// ABOUTME: Main library entry point for the Glimmer LLM gateway
// ABOUTME: Provider-agnostic platforms, response caching, and conversation management
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

#![deny(unsafe_code)]

//! # Glimmer
//!
//! A language-model gateway: one contract over hosted, local, and test
//! backends, a transparent response cache in front of it, and a chat
//! manager that threads multi-turn history and keeps running usage totals.
//!
//! ## Architecture
//!
//! - **`llm`**: `Platform` trait, the `OpenAI`/Ollama/Echo backends, the
//!   `CachedPlatform` decorator, and the `LlmService` facade
//! - **`cache`**: `CacheStorage` trait with in-memory and `SQLite` backends
//! - **`database`**: `SQLite` pool, migrations, and the chat repository
//! - **`services`**: `ChatManager` and the `Outcome` diagnostics type
//! - **`config`** / **`logging`**: environment-driven setup
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use glimmer::config::{DatabaseConfig, LlmConfig};
//! use glimmer::database::Database;
//! use glimmer::errors::AppResult;
//! use glimmer::llm::{ChatOptions, LlmService};
//! use glimmer::services::ChatManager;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let database = Database::new(&DatabaseConfig::from_env()).await?;
//!     let llm = Arc::new(LlmService::with_database(&LlmConfig::from_env(), Some(&database))?);
//!     let manager = ChatManager::from_database(&database, llm);
//!
//!     let chat = manager.create_chat("user-1", "Be brief.", "").await?.into_value();
//!     let turn = manager
//!         .chat_completion(&chat.id, "Hello!", ChatOptions::default())
//!         .await?;
//!     println!("{}", turn.value.text);
//!     Ok(())
//! }
//! ```

/// Response cache storage backends
pub mod cache;

/// Configuration loaded from the environment
pub mod config;

/// `SQLite` persistence for chats and cached responses
pub mod database;

/// Unified error handling
pub mod errors;

/// Language-model platforms and the service facade
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Conversation management
pub mod services;

pub use glimmer_core::constants;
pub use glimmer_core::models;
