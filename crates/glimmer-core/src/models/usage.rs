// ABOUTME: Token and cost accounting attached to every successful model call
// ABOUTME: The cache layer is the only writer of the cache_hit flag
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use serde::{Deserialize, Serialize};

/// Token/cost accounting for a single model call
///
/// `total_tokens` is always `prompt_tokens + completion_tokens` when built
/// through [`Usage::new`]. Backends never set `cache_hit`; the caching
/// decorator forces it on every path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Model that produced the response
    #[serde(rename = "llmModelName")]
    pub model_name: String,
    /// Whether the response was served from cache
    pub cache_hit: bool,
    /// Cost in USD (0 for local and test backends)
    pub cost: f64,
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens produced by the completion
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage for a fresh (non-cached) response
    pub fn new(model_name: impl Into<String>, prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            model_name: model_name.into(),
            cache_hit: false,
            cost: 0.0,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Set the cost of this call
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Return a copy with the cache-hit flag set
    #[must_use]
    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.cache_hit = cache_hit;
        self
    }
}
