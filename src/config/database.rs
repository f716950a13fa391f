// ABOUTME: Database connection configuration
// ABOUTME: SQLite URL and pool sizing read from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use serde::{Deserialize, Serialize};
use std::env;

/// Default database URL (in-memory, nothing persisted)
pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Default connection pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL
    pub url: String,
    /// Maximum pool connections (forced to 1 for in-memory databases)
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        }
    }

    /// Whether the URL points at a private in-memory database
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}
