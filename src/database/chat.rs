// ABOUTME: Persistence for conversations and their ordered messages
// ABOUTME: Atomic dense ordering on append and atomic running usage totals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use glimmer_core::models::{Chat, ChatItem, ChatRole, Usage};

// ============================================================================
// Repository Contract
// ============================================================================

/// Storage operations the chat manager needs
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert an empty conversation
    async fn create_chat(
        &self,
        owner_id: &str,
        label: &str,
        system_prompt: &str,
        model: &str,
    ) -> AppResult<Chat>;

    /// Load a conversation without its messages
    async fn get_chat(&self, chat_id: &str) -> AppResult<Option<Chat>>;

    /// List an owner's conversations, most recently updated first
    async fn list_chats(&self, owner_id: &str, limit: u32, offset: u32) -> AppResult<Vec<Chat>>;

    /// Rename a conversation; `false` if it does not exist
    async fn update_label(&self, chat_id: &str, label: &str) -> AppResult<bool>;

    /// Bump the conversation's `updated_at`
    async fn touch(&self, chat_id: &str) -> AppResult<()>;

    /// Atomically add `usage` to the running totals
    async fn add_usage(&self, chat_id: &str, usage: &Usage) -> AppResult<()>;

    /// Append a message at `last order + 1` (0 for the first)
    async fn append_item(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        usage: Option<&Usage>,
    ) -> AppResult<ChatItem>;

    /// Page through messages in ascending order
    async fn list_items(&self, chat_id: &str, limit: u32, offset: u32) -> AppResult<Vec<ChatItem>>;

    /// The `limit` most recent messages, returned in ascending order
    async fn recent_items(&self, chat_id: &str, limit: u32) -> AppResult<Vec<ChatItem>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// `SQLite` chat repository
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    /// Create a repository over a migrated pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fixed-width timestamps so text ordering matches time ordering
    fn now() -> (DateTime<Utc>, String) {
        let now = Utc::now();
        (now, now.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::database(format!("Invalid timestamp {value}: {e}")))
    }

    fn row_to_chat(row: &SqliteRow) -> AppResult<Chat> {
        Ok(Chat {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            label: row.get("label"),
            system_prompt: row.get("system_prompt"),
            model: row.get("model"),
            total_tokens: row.get("total_tokens"),
            total_cost: row.get("total_cost"),
            created_at: Self::parse_timestamp(row.get("created_at"))?,
            updated_at: Self::parse_timestamp(row.get("updated_at"))?,
            items: Vec::new(),
        })
    }

    fn row_to_item(row: &SqliteRow) -> AppResult<ChatItem> {
        let role: &str = row.get("role");
        let usage: Option<String> = row.get("usage");
        let usage = usage
            .map(|json| serde_json::from_str::<Usage>(&json))
            .transpose()
            .map_err(|e| AppError::serialization(format!("Invalid stored usage: {e}")))?;

        Ok(ChatItem {
            id: row.get("id"),
            chat_id: row.get("chat_id"),
            role: role.parse()?,
            content: row.get("content"),
            usage,
            order: row.get("item_order"),
            created_at: Self::parse_timestamp(row.get("created_at"))?,
            updated_at: Self::parse_timestamp(row.get("updated_at"))?,
        })
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn create_chat(
        &self,
        owner_id: &str,
        label: &str,
        system_prompt: &str,
        model: &str,
    ) -> AppResult<Chat> {
        let id = Uuid::new_v4().to_string();
        let (now, now_str) = Self::now();

        sqlx::query(
            r"
            INSERT INTO chats (id, owner_id, label, system_prompt, model, total_tokens, total_cost, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, 0, $6, $6)
            ",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(label)
        .bind(system_prompt)
        .bind(model)
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create chat: {e}")))?;

        Ok(Chat {
            id,
            owner_id: owner_id.to_owned(),
            label: label.to_owned(),
            system_prompt: system_prompt.to_owned(),
            model: model.to_owned(),
            total_tokens: 0,
            total_cost: 0.0,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        })
    }

    async fn get_chat(&self, chat_id: &str) -> AppResult<Option<Chat>> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, label, system_prompt, model, total_tokens, total_cost, created_at, updated_at
            FROM chats
            WHERE id = $1
            ",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get chat: {e}")))?;

        row.as_ref().map(Self::row_to_chat).transpose()
    }

    async fn list_chats(&self, owner_id: &str, limit: u32, offset: u32) -> AppResult<Vec<Chat>> {
        let rows = sqlx::query(
            r"
            SELECT id, owner_id, label, system_prompt, model, total_tokens, total_cost, created_at, updated_at
            FROM chats
            WHERE owner_id = $1
            ORDER BY updated_at DESC, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(owner_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chats: {e}")))?;

        rows.iter().map(Self::row_to_chat).collect()
    }

    async fn update_label(&self, chat_id: &str, label: &str) -> AppResult<bool> {
        let (_, now_str) = Self::now();

        let result = sqlx::query("UPDATE chats SET label = $1, updated_at = $2 WHERE id = $3")
            .bind(label)
            .bind(&now_str)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update chat label: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, chat_id: &str) -> AppResult<()> {
        let (_, now_str) = Self::now();

        sqlx::query("UPDATE chats SET updated_at = $1 WHERE id = $2")
            .bind(&now_str)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch chat: {e}")))?;

        Ok(())
    }

    async fn add_usage(&self, chat_id: &str, usage: &Usage) -> AppResult<()> {
        let (_, now_str) = Self::now();

        let result = sqlx::query(
            r"
            UPDATE chats
            SET total_tokens = total_tokens + $1,
                total_cost = total_cost + $2,
                updated_at = $3
            WHERE id = $4
            ",
        )
        .bind(i64::from(usage.total_tokens))
        .bind(usage.cost)
        .bind(&now_str)
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update chat usage: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Chat {chat_id}")));
        }
        Ok(())
    }

    async fn append_item(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        usage: Option<&Usage>,
    ) -> AppResult<ChatItem> {
        let id = Uuid::new_v4().to_string();
        let (now, now_str) = Self::now();
        let usage_json = usage.map(serde_json::to_string).transpose()?;

        // Order is computed inside the INSERT so concurrent appends stay dense
        let row = sqlx::query(
            r"
            INSERT INTO chat_items (id, chat_id, role, content, usage, item_order, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, COALESCE(MAX(item_order), -1) + 1, $6, $6
            FROM chat_items
            WHERE chat_id = $2
            RETURNING item_order
            ",
        )
        .bind(&id)
        .bind(chat_id)
        .bind(role.as_str())
        .bind(content)
        .bind(usage_json)
        .bind(&now_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append chat item: {e}")))?;

        Ok(ChatItem {
            id,
            chat_id: chat_id.to_owned(),
            role,
            content: content.to_owned(),
            usage: usage.cloned(),
            order: row.get("item_order"),
            created_at: now,
            updated_at: now,
        })
    }

    async fn list_items(&self, chat_id: &str, limit: u32, offset: u32) -> AppResult<Vec<ChatItem>> {
        let rows = sqlx::query(
            r"
            SELECT id, chat_id, role, content, usage, item_order, created_at, updated_at
            FROM chat_items
            WHERE chat_id = $1
            ORDER BY item_order ASC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(chat_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chat items: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn recent_items(&self, chat_id: &str, limit: u32) -> AppResult<Vec<ChatItem>> {
        let rows = sqlx::query(
            r"
            SELECT id, chat_id, role, content, usage, item_order, created_at, updated_at
            FROM (
                SELECT * FROM chat_items
                WHERE chat_id = $1
                ORDER BY item_order DESC
                LIMIT $2
            )
            ORDER BY item_order ASC
            ",
        )
        .bind(chat_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load recent chat items: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
