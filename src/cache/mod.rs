// ABOUTME: Response cache abstraction for LLM calls with pluggable storage backends
// ABOUTME: Defines the CacheStorage contract: key derivation, get/set per call kind, and sweeping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Response Cache
//!
//! [`CacheStorage`] is consumed by [`crate::llm::CachedPlatform`]. A miss is
//! `Ok(None)`; `Err` always means the storage itself is broken, so the
//! decorator can tell "go fetch fresh" apart from "something failed".
//!
//! Backends:
//! - [`memory::MemoryCacheStorage`]: three bounded in-process TTL maps
//! - [`persistent::PersistentCacheStorage`]: one `SQLite` row per key

/// Cache key derivation
pub mod key;
/// In-process TTL maps
pub mod memory;
/// `SQLite`-backed storage
pub mod persistent;

pub use memory::MemoryCacheStorage;
pub use persistent::PersistentCacheStorage;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{CacheBackend, CacheConfig};
use crate::database::Database;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse};

/// Storage backend for cached LLM responses
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Key for a single-turn chat call with the effective `model`
    fn chat_key(&self, params: &ChatParameters, model: &str) -> String {
        key::chat_key(&params.prompt, &params.system_prompt, model)
    }

    /// Key for a chat-with-history call with the effective `model`
    fn history_key(&self, messages: &[ChatMessage], params: &ChatParameters, model: &str) -> String {
        key::history_key(messages, &params.system_prompt, model)
    }

    /// Key for an image description call with the effective `model`
    fn image_key(&self, params: &DescribeImageParameters, model: &str) -> String {
        key::image_key(
            &params.image,
            &params.chat.prompt,
            &params.chat.system_prompt,
            model,
        )
    }

    /// Read a cached chat response
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage is unavailable or corrupt.
    async fn get_chat(&self, key: &str) -> AppResult<Option<ChatResponse>>;

    /// Store a chat response
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_chat(
        &self,
        key: &str,
        params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()>;

    /// Read a cached history response
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage is unavailable or corrupt.
    async fn get_history(&self, key: &str) -> AppResult<Option<ChatResponse>>;

    /// Store a history response
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_history(
        &self,
        key: &str,
        messages: &[ChatMessage],
        params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()>;

    /// Read a cached image description
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage is unavailable or corrupt.
    async fn get_image(&self, key: &str) -> AppResult<Option<DescribeImageResponse>>;

    /// Store an image description
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set_image(
        &self,
        key: &str,
        params: &DescribeImageParameters,
        response: &DescribeImageResponse,
    ) -> AppResult<()>;

    /// Delete every expired entry, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep fails.
    async fn clean_expired(&self) -> AppResult<u64>;
}

/// Build the storage selected by `config`
///
/// The persistent backend needs a database handle; without one the memory
/// backend is used instead.
#[must_use]
pub fn create_storage(config: &CacheConfig, database: Option<&Database>) -> Arc<dyn CacheStorage> {
    match (config.backend, database) {
        (CacheBackend::Persistent, Some(database)) => {
            info!("Using persistent LLM response cache");
            Arc::new(PersistentCacheStorage::new(database.pool().clone(), &config.ttl))
        }
        (CacheBackend::Persistent, None) => {
            warn!("Persistent cache requested without a database, falling back to memory cache");
            Arc::new(MemoryCacheStorage::new(config))
        }
        (CacheBackend::Memory, _) => {
            info!("Using in-memory LLM response cache");
            Arc::new(MemoryCacheStorage::new(config))
        }
    }
}
