// ABOUTME: In-process response cache with one TTL map per call kind
// ABOUTME: Bounded LRU maps behind reader/writer locks, lazy expiry, and a background sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # In-process Cache
//!
//! Each call kind gets its own bounded [`LruCache`] behind a reader/writer
//! lock. Reads only `peek`, so they share the read lock and never reorder the
//! map; once a map is full, storing a new key evicts the entry that was
//! stored least recently. Expired entries are dropped on read, by
//! [`CacheStorage::clean_expired`], or by an optional background sweep.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use glimmer_core::constants::cache::DEFAULT_MAX_ENTRIES;
use lru::LruCache;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::CacheStorage;
use crate::config::CacheConfig;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse};

/// Cached value with expiration
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

fn capacity(max_entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_entries)
        .or_else(|| NonZeroUsize::new(DEFAULT_MAX_ENTRIES))
        .unwrap_or(NonZeroUsize::MIN)
}

/// One bounded TTL map guarded by a reader/writer lock
struct TtlMap<V> {
    entries: RwLock<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
        }
    }

    async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.peek(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: another task may have refreshed the key
        let mut entries = self.entries.write().await;
        if entries.peek(key).is_some_and(CacheEntry::is_expired) {
            entries.pop(key);
            debug!(key, "Removed expired cache entry");
        }
        drop(entries);
        None
    }

    async fn set(&self, key: &str, value: V) {
        let evicted = self
            .entries
            .write()
            .await
            .push(key.to_owned(), CacheEntry::new(value, self.ttl));
        if let Some((evicted_key, _)) = evicted.filter(|(evicted_key, _)| evicted_key != key) {
            debug!(key = %evicted_key, "Evicted cache entry at capacity");
        }
    }

    async fn sweep(&self) -> u64 {
        let mut entries = self.entries.write().await;

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        drop(entries);

        expired.len() as u64
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// The three per-kind maps, shared with the background sweep
struct CacheMaps {
    chat: TtlMap<ChatResponse>,
    history: TtlMap<ChatResponse>,
    image: TtlMap<DescribeImageResponse>,
}

impl CacheMaps {
    async fn sweep(&self) -> u64 {
        self.chat.sweep().await + self.history.sweep().await + self.image.sweep().await
    }
}

/// In-process cache storage
///
/// Chat and image entries default to a 24 hour TTL, history entries to 6
/// hours. Image entries are keyed by a digest of the image bytes. Each map
/// holds at most `max_entries` entries.
pub struct MemoryCacheStorage {
    maps: Arc<CacheMaps>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl MemoryCacheStorage {
    /// Create storage from the cache configuration
    ///
    /// Starts the background sweep when a cleanup interval is configured and
    /// a tokio runtime is available.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = &config.ttl;
        let storage = Self::bounded(ttl.chat(), ttl.history(), ttl.image(), config.max_entries);
        match config.cleanup_interval() {
            Some(every) => storage.with_cleanup(every),
            None => storage,
        }
    }

    /// Create storage with explicit TTLs and the default capacity
    #[must_use]
    pub fn with_ttls(chat: Duration, history: Duration, image: Duration) -> Self {
        Self::bounded(chat, history, image, DEFAULT_MAX_ENTRIES)
    }

    /// Create storage with explicit TTLs holding at most `max_entries` per map
    ///
    /// A `max_entries` of zero uses the default capacity.
    #[must_use]
    pub fn bounded(chat: Duration, history: Duration, image: Duration, max_entries: usize) -> Self {
        let capacity = capacity(max_entries);
        Self {
            maps: Arc::new(CacheMaps {
                chat: TtlMap::new(chat, capacity),
                history: TtlMap::new(history, capacity),
                image: TtlMap::new(image, capacity),
            }),
            shutdown_tx: None,
        }
    }

    /// Sweep expired entries every `every` on a background task
    ///
    /// The task stops on [`Self::stop_cleanup`] or when the storage is
    /// dropped. Outside a tokio runtime no task is started.
    #[must_use]
    pub fn with_cleanup(mut self, every: Duration) -> Self {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available, background cache cleanup disabled");
            return self;
        };

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let maps: Weak<CacheMaps> = Arc::downgrade(&self.maps);

        runtime.spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(maps) = maps.upgrade() else {
                            break;
                        };
                        let removed = maps.sweep().await;
                        if removed > 0 {
                            debug!("Background sweep removed {removed} expired cache entries");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Cache cleanup task received shutdown signal");
                        break;
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self
    }

    /// Stop the background sweep, if one is running
    pub fn stop_cleanup(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            if let Err(e) = tx.try_send(()) {
                debug!(error = ?e, "Cache shutdown signal send failed (task already stopped)");
            }
        }
    }

    /// Whether a background sweep task was started
    #[must_use]
    pub const fn has_cleanup_task(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Number of stored entries across all maps, expired ones included
    pub async fn len(&self) -> usize {
        self.maps.chat.len().await + self.maps.history.len().await + self.maps.image.len().await
    }

    /// Whether no entries are stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCacheStorage {
    fn default() -> Self {
        let config = CacheConfig::default();
        let ttl = &config.ttl;
        Self::bounded(ttl.chat(), ttl.history(), ttl.image(), config.max_entries)
    }
}

impl Drop for MemoryCacheStorage {
    fn drop(&mut self) {
        self.stop_cleanup();
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn get_chat(&self, key: &str) -> AppResult<Option<ChatResponse>> {
        Ok(self.maps.chat.get(key).await)
    }

    async fn set_chat(
        &self,
        key: &str,
        _params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()> {
        self.maps.chat.set(key, response.clone()).await;
        Ok(())
    }

    async fn get_history(&self, key: &str) -> AppResult<Option<ChatResponse>> {
        Ok(self.maps.history.get(key).await)
    }

    async fn set_history(
        &self,
        key: &str,
        _messages: &[ChatMessage],
        _params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()> {
        self.maps.history.set(key, response.clone()).await;
        Ok(())
    }

    async fn get_image(&self, key: &str) -> AppResult<Option<DescribeImageResponse>> {
        Ok(self.maps.image.get(key).await)
    }

    async fn set_image(
        &self,
        key: &str,
        _params: &DescribeImageParameters,
        response: &DescribeImageResponse,
    ) -> AppResult<()> {
        self.maps.image.set(key, response.clone()).await;
        Ok(())
    }

    async fn clean_expired(&self) -> AppResult<u64> {
        let removed = self.maps.sweep().await;
        if removed > 0 {
            debug!("Cleaned up {removed} expired cache entries");
        }
        Ok(removed)
    }
}
