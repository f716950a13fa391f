// ABOUTME: SQLite-backed response cache storing one row per cache key with a TTL column
// ABOUTME: Lazy delete on expired read, bulk sweep, condensed history rows, images never cached
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Persistent Cache Storage
//!
//! Rows live in the `llm_responses` table created by
//! [`crate::database::Database::migrate`]. `created_at` is stored in Unix
//! milliseconds, as is `ttl_ms`; a row is expired once
//! `created_at + ttl_ms < now`, evaluated as `now - created_at > ttl_ms` so
//! huge TTLs cannot overflow. A `ttl_ms` of zero never expires.
//!
//! History calls are stored with the last user message as the prompt and a
//! `[history: N messages]` annotation in front of the system prompt, both
//! truncated for introspection. Image descriptions are never stored: the
//! payloads are large and reads always miss.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use glimmer_core::constants::cache::{HISTORY_KEY_PREFIX, MAX_PERSISTED_FIELD_CHARS};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{key, CacheStorage};
use crate::config::CacheTtlConfig;
use crate::errors::{AppError, AppResult};
use crate::llm::{
    ChatMessage, ChatParameters, ChatResponse, ChatRole, DescribeImageParameters,
    DescribeImageResponse, Usage,
};

/// Fields of one persisted row
struct CacheRecord<'a> {
    key: &'a str,
    prompt: String,
    system_prompt: String,
    response: &'a ChatResponse,
    ttl: Duration,
}

/// Response cache backed by the `llm_responses` table
#[derive(Clone)]
pub struct PersistentCacheStorage {
    pool: SqlitePool,
    chat_ttl: Duration,
    history_ttl: Duration,
}

impl PersistentCacheStorage {
    /// Create storage over an already migrated pool
    #[must_use]
    pub fn new(pool: SqlitePool, ttl: &CacheTtlConfig) -> Self {
        Self {
            pool,
            chat_ttl: ttl.chat(),
            history_ttl: ttl.history(),
        }
    }

    /// Create storage with explicit chat and history TTLs
    #[must_use]
    pub fn with_ttls(pool: SqlitePool, chat_ttl: Duration, history_ttl: Duration) -> Self {
        Self {
            pool,
            chat_ttl,
            history_ttl,
        }
    }

    fn truncate(text: &str) -> String {
        text.chars().take(MAX_PERSISTED_FIELD_CHARS).collect()
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// TTL in whole milliseconds, rounded up so a non-zero TTL never becomes zero
    fn ttl_millis(ttl: Duration) -> i64 {
        if ttl.is_zero() {
            return 0;
        }
        i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
    }

    fn is_expired(created_at: i64, ttl_ms: i64, now: i64) -> bool {
        ttl_ms > 0 && now.saturating_sub(created_at) > ttl_ms
    }

    async fn fetch(&self, key: &str) -> AppResult<Option<ChatResponse>> {
        let row = sqlx::query(
            r"
            SELECT response, model_name, prompt_tokens, completion_tokens, total_tokens,
                   cost, ttl_ms, created_at
            FROM llm_responses
            WHERE key = $1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to read cache entry: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ttl_ms: i64 = row.get("ttl_ms");
        let created_at: i64 = row.get("created_at");
        if Self::is_expired(created_at, ttl_ms, Self::now_millis()) {
            sqlx::query("DELETE FROM llm_responses WHERE key = $1")
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage(format!("Failed to delete expired cache entry: {e}")))?;
            debug!(key, "Deleted expired cache row");
            return Ok(None);
        }

        let to_u32 = |column: &str| u32::try_from(row.get::<i64, _>(column)).unwrap_or_default();
        let usage = Usage {
            model_name: row.get("model_name"),
            cache_hit: false,
            cost: row.get("cost"),
            prompt_tokens: to_u32("prompt_tokens"),
            completion_tokens: to_u32("completion_tokens"),
            total_tokens: to_u32("total_tokens"),
        };

        Ok(Some(ChatResponse {
            text: row.get("response"),
            usage,
        }))
    }

    async fn store(&self, record: CacheRecord<'_>) -> AppResult<()> {
        let usage = &record.response.usage;
        sqlx::query(
            r"
            INSERT INTO llm_responses
                (key, prompt, system_prompt, response, model_name, prompt_tokens,
                 completion_tokens, total_tokens, cost, ttl_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT(key) DO UPDATE SET
                prompt = excluded.prompt,
                system_prompt = excluded.system_prompt,
                response = excluded.response,
                model_name = excluded.model_name,
                prompt_tokens = excluded.prompt_tokens,
                completion_tokens = excluded.completion_tokens,
                total_tokens = excluded.total_tokens,
                cost = excluded.cost,
                ttl_ms = excluded.ttl_ms,
                created_at = excluded.created_at
            ",
        )
        .bind(record.key)
        .bind(&record.prompt)
        .bind(&record.system_prompt)
        .bind(&record.response.text)
        .bind(&usage.model_name)
        .bind(i64::from(usage.prompt_tokens))
        .bind(i64::from(usage.completion_tokens))
        .bind(i64::from(usage.total_tokens))
        .bind(usage.cost)
        .bind(Self::ttl_millis(record.ttl))
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to write cache entry: {e}")))?;

        debug!(key = record.key, "Stored cache row");
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for PersistentCacheStorage {
    fn history_key(&self, messages: &[ChatMessage], params: &ChatParameters, model: &str) -> String {
        let material = key::history_key_material(messages);
        format!(
            "{HISTORY_KEY_PREFIX}{}",
            key::chat_key(&material, &params.system_prompt, model)
        )
    }

    async fn get_chat(&self, key: &str) -> AppResult<Option<ChatResponse>> {
        self.fetch(key).await
    }

    async fn set_chat(
        &self,
        key: &str,
        params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()> {
        self.store(CacheRecord {
            key,
            prompt: Self::truncate(&params.prompt),
            system_prompt: Self::truncate(&params.system_prompt),
            response,
            ttl: self.chat_ttl,
        })
        .await
    }

    async fn get_history(&self, key: &str) -> AppResult<Option<ChatResponse>> {
        self.fetch(key).await
    }

    async fn set_history(
        &self,
        key: &str,
        messages: &[ChatMessage],
        params: &ChatParameters,
        response: &ChatResponse,
    ) -> AppResult<()> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map_or("", |m| m.content.as_str());
        let annotated_system = format!(
            "[history: {} messages] {}",
            messages.len(),
            params.system_prompt
        );

        self.store(CacheRecord {
            key,
            prompt: Self::truncate(last_user),
            system_prompt: Self::truncate(&annotated_system),
            response,
            ttl: self.history_ttl,
        })
        .await
    }

    async fn get_image(&self, _key: &str) -> AppResult<Option<DescribeImageResponse>> {
        Ok(None)
    }

    async fn set_image(
        &self,
        key: &str,
        _params: &DescribeImageParameters,
        _response: &DescribeImageResponse,
    ) -> AppResult<()> {
        debug!(key, "Image descriptions are not persisted");
        Ok(())
    }

    async fn clean_expired(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM llm_responses WHERE ttl_ms > 0 AND $1 - created_at > ttl_ms",
        )
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to clean expired cache entries: {e}")))?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!("Cleaned up {removed} expired cache rows");
        }
        Ok(removed)
    }
}
