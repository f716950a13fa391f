// ABOUTME: Configuration type definitions for backend and cache selection
// ABOUTME: Contains PlatformType and CacheBackend enums selected once at construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::errors::AppError;

/// Language-model backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// Hosted `OpenAI`-compatible API with metered billing
    OpenAi,
    /// Local inference server with optional fallback endpoint (default)
    #[default]
    Ollama,
    /// Deterministic test double, no network access
    Echo,
}

impl PlatformType {
    /// Environment variable name for backend selection
    pub const ENV_VAR: &'static str = "LLM_PLATFORM";

    /// Stable lowercase name of the backend
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Echo => "echo",
        }
    }

    /// Parse from string with fallback to default
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Load from environment variable
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }
}

impl FromStr for PlatformType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" | "local" => Ok(Self::Ollama),
            "echo" => Ok(Self::Echo),
            other => Err(AppError::config(format!("unknown LLM platform: {other}"))),
        }
    }
}

impl Display for PlatformType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Response cache backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process TTL maps (default)
    #[default]
    Memory,
    /// Rows in the application database
    Persistent,
}

impl CacheBackend {
    /// Environment variable name for cache backend selection
    pub const ENV_VAR: &'static str = "LLM_CACHE_BACKEND";

    /// Parse from string with fallback to default
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "persistent" | "database" | "pocketbase" => Self::Persistent,
            _ => Self::Memory,
        }
    }

    /// Load from environment variable
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }
}

impl Display for CacheBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Persistent => f.write_str("persistent"),
        }
    }
}
