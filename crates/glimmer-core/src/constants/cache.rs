// ABOUTME: Cache-related constants for TTL, key prefixes, and persisted field limits
// ABOUTME: Shared by the in-process and persistent response cache backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

/// Single-turn chat response TTL (24 hours)
pub const TTL_CHAT_SECS: u64 = 86_400; // 24 hours

/// Chat-with-history response TTL (6 hours) - conversations evolve, staleness costs more
pub const TTL_HISTORY_SECS: u64 = 21_600; // 6 hours

/// Image description response TTL (24 hours)
pub const TTL_IMAGE_SECS: u64 = 86_400; // 24 hours

/// Prefix applied to history cache keys so they never collide with single-turn keys
pub const HISTORY_KEY_PREFIX: &str = "history-";

/// Prefix applied to image cache keys
pub const IMAGE_KEY_PREFIX: &str = "image-";

/// Maximum stored length of the introspection prompt/system fields for history rows
pub const MAX_PERSISTED_FIELD_CHARS: usize = 1_000;

/// Separator between condensed history entries
pub const HISTORY_ENTRY_SEPARATOR: char = '|';

/// Default capacity of each in-process cache map before the least recent entry is evicted
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;

/// Default interval between background sweeps of the in-process cache (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
