// ABOUTME: Response cache configuration for the LLM gateway
// ABOUTME: Enable flag, backend selection, per call-kind TTLs, and in-process bounds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use glimmer_core::constants::cache;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::types::CacheBackend;

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether responses are cached at all
    pub enabled: bool,
    /// Which storage backs the cache
    pub backend: CacheBackend,
    /// Cache TTL configuration
    #[serde(default)]
    pub ttl: CacheTtlConfig,
    /// Capacity of each in-process map (0 uses the default)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Seconds between background sweeps of the in-process cache (0 disables)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

const fn default_max_entries() -> usize {
    cache::DEFAULT_MAX_ENTRIES
}

const fn default_cleanup_interval_secs() -> u64 {
    cache::DEFAULT_CLEANUP_INTERVAL_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            ttl: CacheTtlConfig::default(),
            max_entries: cache::DEFAULT_MAX_ENTRIES,
            cleanup_interval_secs: cache::DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// Load cache configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("LLM_CACHE_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            backend: CacheBackend::from_env(),
            ttl: CacheTtlConfig::from_env(),
            max_entries: env::var("LLM_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(cache::DEFAULT_MAX_ENTRIES),
            cleanup_interval_secs: env::var("LLM_CACHE_CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(cache::DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }

    /// Whether responses are cached in the database and outlive the process
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.enabled && self.backend == CacheBackend::Persistent
    }

    /// Interval between background sweeps, `None` when disabled
    #[must_use]
    pub const fn cleanup_interval(&self) -> Option<Duration> {
        if self.cleanup_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.cleanup_interval_secs))
        }
    }
}

/// Cache TTL configuration per call kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    /// Single-turn chat TTL in seconds (default: 24 hours)
    pub chat_secs: u64,
    /// Chat-with-history TTL in seconds (default: 6 hours)
    pub history_secs: u64,
    /// Image description TTL in seconds (default: 24 hours)
    pub image_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            chat_secs: cache::TTL_CHAT_SECS,
            history_secs: cache::TTL_HISTORY_SECS,
            image_secs: cache::TTL_IMAGE_SECS,
        }
    }
}

impl CacheTtlConfig {
    /// Load cache TTL configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            chat_secs: env::var("LLM_CACHE_TTL_CHAT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(cache::TTL_CHAT_SECS),
            history_secs: env::var("LLM_CACHE_TTL_HISTORY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(cache::TTL_HISTORY_SECS),
            image_secs: env::var("LLM_CACHE_TTL_IMAGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(cache::TTL_IMAGE_SECS),
        }
    }

    /// Single-turn chat TTL
    #[must_use]
    pub const fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_secs)
    }

    /// Chat-with-history TTL
    #[must_use]
    pub const fn history(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    /// Image description TTL
    #[must_use]
    pub const fn image(&self) -> Duration {
        Duration::from_secs(self.image_secs)
    }
}
