// ABOUTME: SQLite connection pool and schema migrations for chats and cached responses
// ABOUTME: Single shared connection for in-memory databases, create-if-missing for files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Database Management
//!
//! Owns the `SQLite` pool shared by the chat repository and the persistent
//! response cache. [`Database::new`] connects and runs [`Database::migrate`];
//! every statement is `IF NOT EXISTS`, so migrating twice is harmless.

mod chat;

pub use chat::{ChatRepository, SqliteChatRepository};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};

/// How long a writer waits for a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database handle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the configured database and run migrations
    ///
    /// File databases are created if missing. In-memory databases use a
    /// single long-lived connection so every caller sees the same schema.
    ///
    /// # Errors
    ///
    /// Returns a database error if the URL is invalid, the connection fails,
    /// or a migration fails.
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL {}: {e}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool_options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {}: {e}", config.url)))?;

        let db = Self { pool };
        db.migrate().await?;

        info!(url = %config.url, "Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns a database error if any statement fails.
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_chats().await?;
        self.migrate_llm_responses().await?;
        debug!("Database migrations complete");
        Ok(())
    }

    async fn migrate_chats(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                label TEXT NOT NULL,
                system_prompt TEXT NOT NULL DEFAULT '',
                model TEXT NOT NULL DEFAULT '',
                total_tokens INTEGER NOT NULL DEFAULT 0,
                total_cost REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chats_owner_updated ON chats(owner_id, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_items (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('system', 'user', 'assistant')),
                content TEXT NOT NULL,
                usage TEXT,
                item_order INTEGER NOT NULL CHECK (item_order >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(chat_id, item_order)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_items_chat_order ON chat_items(chat_id, item_order)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_llm_responses(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS llm_responses (
                key TEXT PRIMARY KEY,
                prompt TEXT NOT NULL,
                system_prompt TEXT NOT NULL,
                response TEXT NOT NULL,
                model_name TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                ttl_ms INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_llm_responses_created ON llm_responses(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
