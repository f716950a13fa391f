// ABOUTME: Caching decorator that wraps any Platform with a CacheStorage backend
// ABOUTME: Honors per-call disable/ignore flags, owns the cache_hit flag, and never fails on cache errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Cached Platform
//!
//! For chat, history chat, and image description:
//!
//! 1. `disable_cache` bypasses the cache entirely (no read, no write).
//! 2. Otherwise the key is derived from the effective model and, unless
//!    `ignore_cache` is set, the storage is read. A hit is returned with
//!    `cache_hit = true`.
//! 3. On a miss the wrapped platform is called and its usage gets
//!    `cache_hit = false`.
//! 4. The fresh response is written back. Read and write failures are logged
//!    and treated as a miss / ignored.
//!
//! The write happens only after the wrapped call returns successfully, so a
//! cancelled call never leaves a cache entry behind.
//!
//! The model catalog is cached until [`CachedPlatform::clear_models_cache`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse,
    ModelInfo, Platform, PlatformType,
};
use crate::cache::CacheStorage;
use crate::errors::AppResult;

/// Platform decorator adding response caching
pub struct CachedPlatform<P> {
    inner: P,
    storage: Arc<dyn CacheStorage>,
    models: RwLock<Option<Vec<ModelInfo>>>,
}

impl<P: Platform> CachedPlatform<P> {
    /// Wrap `inner` with `storage`
    pub fn new(inner: P, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            inner,
            storage,
            models: RwLock::new(None),
        }
    }

    /// The wrapped platform
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// The backing storage
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Drop the cached model catalog so the next listing hits the platform
    pub async fn clear_models_cache(&self) {
        *self.models.write().await = None;
    }

    /// Delete expired cache entries from the storage
    ///
    /// # Errors
    ///
    /// Returns an error if the storage sweep fails.
    pub async fn clean_expired(&self) -> AppResult<u64> {
        self.storage.clean_expired().await
    }

    fn effective_model<'a>(&'a self, params: &'a ChatParameters) -> &'a str {
        params
            .requested_model()
            .unwrap_or_else(|| self.inner.default_model())
    }
}

#[async_trait]
impl<P: Platform> Platform for CachedPlatform<P> {
    fn platform_type(&self) -> PlatformType {
        self.inner.platform_type()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        if params.cache.disable_cache {
            let mut response = self.inner.chat(params).await?;
            response.usage.cache_hit = false;
            return Ok(response);
        }

        let key = self.storage.chat_key(params, self.effective_model(params));

        if !params.cache.ignore_cache {
            match self.storage.get_chat(&key).await {
                Ok(Some(mut cached)) => {
                    debug!(key = %key, "Chat cache hit");
                    cached.usage.cache_hit = true;
                    return Ok(cached);
                }
                Ok(None) => debug!(key = %key, "Chat cache miss"),
                Err(e) => warn!(key = %key, "Chat cache read failed, treating as miss: {e}"),
            }
        }

        let mut response = self.inner.chat(params).await?;
        response.usage.cache_hit = false;

        if let Err(e) = self.storage.set_chat(&key, params, &response).await {
            warn!(key = %key, "Failed to cache chat response: {e}");
        }
        Ok(response)
    }

    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse> {
        if params.cache.disable_cache {
            let mut response = self.inner.chat_with_history(messages, params).await?;
            response.usage.cache_hit = false;
            return Ok(response);
        }

        let key = self
            .storage
            .history_key(messages, params, self.effective_model(params));

        if !params.cache.ignore_cache {
            match self.storage.get_history(&key).await {
                Ok(Some(mut cached)) => {
                    debug!(key = %key, "History cache hit");
                    cached.usage.cache_hit = true;
                    return Ok(cached);
                }
                Ok(None) => debug!(key = %key, "History cache miss"),
                Err(e) => warn!(key = %key, "History cache read failed, treating as miss: {e}"),
            }
        }

        let mut response = self.inner.chat_with_history(messages, params).await?;
        response.usage.cache_hit = false;

        if let Err(e) = self
            .storage
            .set_history(&key, messages, params, &response)
            .await
        {
            warn!(key = %key, "Failed to cache history response: {e}");
        }
        Ok(response)
    }

    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        if params.chat.cache.disable_cache {
            let mut response = self.inner.describe_image(params).await?;
            response.usage.cache_hit = false;
            return Ok(response);
        }

        let key = self
            .storage
            .image_key(params, self.effective_model(&params.chat));

        if !params.chat.cache.ignore_cache {
            match self.storage.get_image(&key).await {
                Ok(Some(mut cached)) => {
                    debug!(key = %key, "Image cache hit");
                    cached.usage.cache_hit = true;
                    return Ok(cached);
                }
                Ok(None) => debug!(key = %key, "Image cache miss"),
                Err(e) => warn!(key = %key, "Image cache read failed, treating as miss: {e}"),
            }
        }

        let mut response = self.inner.describe_image(params).await?;
        response.usage.cache_hit = false;

        if let Err(e) = self.storage.set_image(&key, params, &response).await {
            warn!(key = %key, "Failed to cache image description: {e}");
        }
        Ok(response)
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        let cached = self.models.read().await.clone();
        if let Some(models) = cached {
            return Ok(models);
        }

        let models = self.inner.list_models().await?;
        *self.models.write().await = Some(models.clone());
        Ok(models)
    }
}
