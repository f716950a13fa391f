// ABOUTME: Backend defaults for hosted and local-inference language-model platforms
// ABOUTME: Endpoints, default models, per-call timeouts, pricing, and pool sizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

// ============================================================================
// Hosted API (OpenAI)
// ============================================================================

/// Default base URL for the hosted API
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default hosted model
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default price in USD per million tokens for the hosted model
pub const OPENAI_DEFAULT_COST_PER_MILLION: f64 = 0.15;

/// Models exposed by the hosted platform unless overridden
pub const OPENAI_DEFAULT_ALLOWED_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"];

/// Per-call timeout for hosted API requests
pub const OPENAI_TIMEOUT_SECS: u64 = 60;

/// Connection timeout for hosted API requests
pub const OPENAI_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Local inference (Ollama)
// ============================================================================

/// Default local inference endpoint
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Default local model
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2:1b";

/// Per-call timeout for local inference (30 minutes) - small hardware can be slow
pub const OLLAMA_TIMEOUT_SECS: u64 = 1_800;

/// Connection timeout for local inference endpoints
pub const OLLAMA_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Bounded idle-connection pool per host for the local inference client
pub const OLLAMA_MAX_IDLE_CONNECTIONS: usize = 100;

// ============================================================================
// Echo
// ============================================================================

/// Model name reported by the echo platform
pub const ECHO_MODEL: &str = "echo";

/// Prompt tokens charged per history message by the echo platform
pub const ECHO_TOKENS_PER_MESSAGE: u32 = 10;

/// Prompt tokens charged for an image by the echo platform
pub const ECHO_IMAGE_TOKENS: u32 = 50;

/// Characters per token used by the shared token estimator
pub const CHARS_PER_TOKEN: usize = 4;

/// Default prompt used when describing an image without one
pub const DEFAULT_IMAGE_PROMPT: &str = "What's in this image?";
