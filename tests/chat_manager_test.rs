// ABOUTME: Integration tests for conversation management over SQLite and the echo backend
// ABOUTME: Ordering, running totals, history fallback, system prompts, paging, and validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use glimmer::database::{ChatRepository, Database, SqliteChatRepository};
use glimmer::errors::{AppError, AppResult, ErrorCode};
use glimmer::llm::{ChatOptions, ChatRole, EchoPlatform, Usage};
use glimmer::models::{Chat, ChatItem};
use glimmer::services::{ChatManager, Step};

mod common;

use common::{service_over, CountingPlatform};

/// `SQLite` repository that fails selected bookkeeping writes
struct FailingRepository {
    inner: SqliteChatRepository,
    fail_roles: Vec<ChatRole>,
    fail_usage: bool,
    fail_touch: bool,
}

impl FailingRepository {
    fn over(database: &Database) -> Self {
        Self {
            inner: SqliteChatRepository::new(database.pool().clone()),
            fail_roles: Vec::new(),
            fail_usage: false,
            fail_touch: false,
        }
    }

    fn broken(what: &str) -> AppError {
        AppError::database(format!("{what} unavailable"))
    }
}

#[async_trait]
impl ChatRepository for FailingRepository {
    async fn create_chat(
        &self,
        owner_id: &str,
        label: &str,
        system_prompt: &str,
        model: &str,
    ) -> AppResult<Chat> {
        self.inner
            .create_chat(owner_id, label, system_prompt, model)
            .await
    }

    async fn get_chat(&self, chat_id: &str) -> AppResult<Option<Chat>> {
        self.inner.get_chat(chat_id).await
    }

    async fn list_chats(&self, owner_id: &str, limit: u32, offset: u32) -> AppResult<Vec<Chat>> {
        self.inner.list_chats(owner_id, limit, offset).await
    }

    async fn update_label(&self, chat_id: &str, label: &str) -> AppResult<bool> {
        self.inner.update_label(chat_id, label).await
    }

    async fn touch(&self, chat_id: &str) -> AppResult<()> {
        if self.fail_touch {
            return Err(Self::broken("touch"));
        }
        self.inner.touch(chat_id).await
    }

    async fn add_usage(&self, chat_id: &str, usage: &Usage) -> AppResult<()> {
        if self.fail_usage {
            return Err(Self::broken("usage totals"));
        }
        self.inner.add_usage(chat_id, usage).await
    }

    async fn append_item(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        usage: Option<&Usage>,
    ) -> AppResult<ChatItem> {
        if self.fail_roles.contains(&role) {
            return Err(Self::broken("append"));
        }
        self.inner.append_item(chat_id, role, content, usage).await
    }

    async fn list_items(&self, chat_id: &str, limit: u32, offset: u32) -> AppResult<Vec<ChatItem>> {
        self.inner.list_items(chat_id, limit, offset).await
    }

    async fn recent_items(&self, chat_id: &str, limit: u32) -> AppResult<Vec<ChatItem>> {
        self.inner.recent_items(chat_id, limit).await
    }
}

fn manager_over(repo: FailingRepository) -> ChatManager {
    ChatManager::new(Arc::new(repo), service_over(EchoPlatform::new()))
}

async fn echo_manager() -> Result<(Database, ChatManager)> {
    let database = common::create_test_database().await?;
    let manager = ChatManager::from_database(&database, service_over(EchoPlatform::new()));
    Ok((database, manager))
}

#[tokio::test]
async fn test_create_chat_stores_system_prompt_first() -> Result<()> {
    let (_db, manager) = echo_manager().await?;

    let outcome = manager
        .create_chat("user-1", "You are terse.", "echo")
        .await?;
    assert!(outcome.is_clean());

    let chat = outcome.into_value();
    assert_eq!(chat.owner_id, "user-1");
    assert_eq!(chat.label, "New chat");
    assert_eq!(chat.system_prompt, "You are terse.");
    assert_eq!(chat.total_tokens, 0);
    assert_eq!(chat.items.len(), 1);
    assert_eq!(chat.items[0].role, ChatRole::System);
    assert_eq!(chat.items[0].order, 0);

    let plain = manager.create_chat("user-1", "", "").await?.into_value();
    assert!(plain.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_messages_are_ordered_from_zero() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    for i in 0..5 {
        let role = if i % 2 == 0 {
            ChatRole::User
        } else {
            ChatRole::Assistant
        };
        let outcome = manager
            .add_chat_message(&chat.id, role, &format!("message {i}"), None)
            .await?;
        assert!(outcome.is_clean());
        assert_eq!(outcome.value.order, i);
    }

    let items = manager.get_chat_messages(&chat.id, None, 0).await?;
    let orders: Vec<i64> = items.iter().map(|item| item.order).collect();
    assert_eq!(orders, [0, 1, 2, 3, 4]);

    let page = manager.get_chat_messages(&chat.id, Some(2), 2).await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].content, "message 2");
    assert_eq!(page[1].content, "message 3");

    Ok(())
}

#[tokio::test]
async fn test_concurrent_appends_get_distinct_orders() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let mut handles = Vec::new();
    for i in 0..10 {
        let manager = manager.clone();
        let chat_id = chat.id.clone();
        handles.push(tokio::spawn(async move {
            manager
                .add_chat_message(&chat_id, ChatRole::User, &format!("m{i}"), None)
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let items = manager.get_chat_messages(&chat.id, Some(50), 0).await?;
    let orders: Vec<i64> = items.iter().map(|item| item.order).collect();
    assert_eq!(orders, (0..10).collect::<Vec<i64>>());

    Ok(())
}

#[tokio::test]
async fn test_completion_appends_both_messages_and_accumulates_totals() -> Result<()> {
    let database = common::create_test_database().await?;
    let (platform, counts) = CountingPlatform::with_cost(0.5);
    let manager = ChatManager::from_database(&database, service_over(platform));
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let first = manager
        .chat_completion(&chat.id, "Hello there", ChatOptions::default())
        .await?;
    assert!(first.is_clean());
    let first = first.into_value();
    assert!(first.used_history);
    assert_eq!(first.model, "echo");
    assert_eq!(first.user_item.order, 0);
    assert_eq!(first.assistant_item.as_ref().unwrap().order, 1);
    assert_eq!(
        first.assistant_item.as_ref().unwrap().usage.as_ref(),
        Some(&first.usage)
    );

    let second = manager
        .chat_completion(&chat.id, "And again", ChatOptions::default())
        .await?
        .into_value();
    assert_eq!(second.user_item.order, 2);
    assert_eq!(counts.history(), 2);
    assert_eq!(counts.chat(), 0);

    let reloaded = manager.get_chat(&chat.id).await?.into_value();
    assert_eq!(
        reloaded.total_tokens,
        i64::from(first.usage.total_tokens + second.usage.total_tokens)
    );
    assert!((reloaded.total_cost - 1.0).abs() < 1e-9);
    assert_eq!(reloaded.items.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_history_failure_falls_back_to_single_turn() -> Result<()> {
    let database = common::create_test_database().await?;
    let (platform, counts) = CountingPlatform::failing_history();
    let manager = ChatManager::from_database(&database, service_over(platform));
    let chat = manager.create_chat("user-1", "Be brief", "").await?.into_value();

    let outcome = manager
        .chat_completion(&chat.id, "Say hi", ChatOptions::default())
        .await?;

    assert!(outcome.failed(Step::HistoryChat));
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(
        outcome.diagnostics[0].code,
        ErrorCode::ExternalServiceUnavailable
    );

    let result = outcome.into_value();
    assert!(!result.used_history);
    assert_eq!(result.text, "Echo response to: Say hi\nSystem context: Be brief");
    assert!(result.assistant_item.is_some());
    assert_eq!(counts.history(), 1);
    assert_eq!(counts.chat(), 1);

    Ok(())
}

#[tokio::test]
async fn test_system_item_excluded_from_context_when_prompt_set() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager
        .create_chat("user-1", "You are terse.", "")
        .await?
        .into_value();

    let result = manager
        .chat_completion(&chat.id, "Hi", ChatOptions::default())
        .await?
        .into_value();

    // Only the user message is sent; the system prompt travels separately
    assert!(result
        .text
        .contains("Echo response to message history with 1 total messages:"));
    assert!(result.text.contains("- 0 system messages"));
    assert!(result.text.contains("System prompt: You are terse."));

    Ok(())
}

#[tokio::test]
async fn test_model_resolution_prefers_option_then_chat() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager
        .create_chat("user-1", "", "chat-model")
        .await?
        .into_value();
    let default_chat = manager.create_chat("user-1", "", "").await?.into_value();

    let from_chat = manager
        .chat_completion(&chat.id, "Hi", ChatOptions::default())
        .await?
        .into_value();
    assert_eq!(from_chat.model, "chat-model");
    assert_eq!(from_chat.usage.model_name, "chat-model");

    let from_option = manager
        .chat_completion(&chat.id, "Hi", ChatOptions::default().with_model("override"))
        .await?
        .into_value();
    assert_eq!(from_option.model, "override");

    let from_service = manager
        .chat_completion(&default_chat.id, "Hi", ChatOptions::default())
        .await?
        .into_value();
    assert_eq!(from_service.model, "echo");

    Ok(())
}

#[tokio::test]
async fn test_get_chat_returns_recent_window_in_order() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    for i in 0..105 {
        manager
            .add_chat_message(&chat.id, ChatRole::User, &format!("m{i}"), None)
            .await?;
    }

    let loaded = manager.get_chat(&chat.id).await?;
    assert!(loaded.is_clean());
    let items = loaded.into_value().items;
    assert_eq!(items.len(), 100);
    assert_eq!(items[0].order, 5);
    assert_eq!(items[99].order, 104);

    Ok(())
}

#[tokio::test]
async fn test_get_chats_orders_by_most_recent_update() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let older = manager.create_chat("user-1", "", "").await?.into_value();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = manager.create_chat("user-1", "", "").await?.into_value();
    manager.create_chat("user-2", "", "").await?;

    let chats = manager.get_chats("user-1", None, 0).await?;
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].id, newer.id);

    tokio::time::sleep(Duration::from_millis(5)).await;
    manager
        .add_chat_message(&older.id, ChatRole::User, "bump", None)
        .await?;

    let chats = manager.get_chats("user-1", None, 0).await?;
    assert_eq!(chats[0].id, older.id);

    let limited = manager.get_chats("user-1", Some(1), 1).await?;
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, newer.id);

    Ok(())
}

#[tokio::test]
async fn test_update_label_and_validation() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    manager.update_chat_label(&chat.id, "Trip planning").await?;
    let renamed = manager.get_chat(&chat.id).await?.into_value();
    assert_eq!(renamed.label, "Trip planning");

    let missing = manager
        .update_chat_label("no-such-chat", "x")
        .await
        .unwrap_err();
    assert_eq!(missing.code, ErrorCode::ResourceNotFound);

    let empty_label = manager.update_chat_label(&chat.id, " ").await.unwrap_err();
    assert_eq!(empty_label.code, ErrorCode::MissingRequiredField);

    let empty_id = manager.get_chat("").await.unwrap_err();
    assert_eq!(empty_id.code, ErrorCode::MissingRequiredField);

    let empty_owner = manager.create_chat("", "", "").await.unwrap_err();
    assert_eq!(empty_owner.code, ErrorCode::MissingRequiredField);

    let unknown = manager
        .chat_completion("no-such-chat", "hi", ChatOptions::default())
        .await
        .unwrap_err();
    assert_eq!(unknown.code, ErrorCode::ResourceNotFound);

    let empty_message = manager
        .chat_completion(&chat.id, "", ChatOptions::default())
        .await
        .unwrap_err();
    assert_eq!(empty_message.code, ErrorCode::MissingRequiredField);

    Ok(())
}

#[tokio::test]
async fn test_message_usage_round_trips() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    let chat = manager.create_chat("user-1", "", "").await?.into_value();
    let usage = Usage::new("gpt-4o-mini", 10, 20).with_cost(0.01);

    manager
        .add_chat_message(&chat.id, ChatRole::Assistant, "stored", Some(&usage))
        .await?;

    let items = manager.get_chat_messages(&chat.id, None, 0).await?;
    assert_eq!(items[0].usage.as_ref(), Some(&usage));
    assert_eq!(items[0].chat_id, chat.id);

    Ok(())
}

#[tokio::test]
async fn test_manager_exposes_shared_service() -> Result<()> {
    let (_db, manager) = echo_manager().await?;
    assert_eq!(manager.llm().default_model(), "echo");
    Ok(())
}

#[tokio::test]
async fn test_model_resolution_falls_back_to_first_listed_model() -> Result<()> {
    let database = common::create_test_database().await?;
    let (platform, counts) = CountingPlatform::without_default_model();
    let manager = ChatManager::from_database(&database, service_over(platform));
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let outcome = manager
        .chat_completion(&chat.id, "Hi", ChatOptions::default())
        .await?;
    assert!(outcome.is_clean());
    let result = outcome.into_value();
    assert_eq!(result.model, "echo");
    assert_eq!(result.usage.model_name, "echo");
    assert_eq!(counts.models(), 1);

    // The listing is only consulted when nothing else names a model
    manager
        .chat_completion(&chat.id, "Hi", ChatOptions::default().with_model("explicit"))
        .await?;
    assert_eq!(counts.models(), 1);

    Ok(())
}

#[tokio::test]
async fn test_assistant_append_failure_still_returns_reply() -> Result<()> {
    let database = common::create_test_database().await?;
    let manager = manager_over(FailingRepository {
        fail_roles: vec![ChatRole::Assistant],
        ..FailingRepository::over(&database)
    });
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let outcome = manager
        .chat_completion(&chat.id, "Hello there", ChatOptions::default())
        .await?;

    assert!(outcome.failed(Step::AssistantMessage));
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].code, ErrorCode::DatabaseError);

    let result = outcome.into_value();
    assert!(!result.text.is_empty());
    assert!(result.assistant_item.is_none());
    assert_eq!(result.user_item.order, 0);

    // Totals still count the reply even though it was not stored
    let reloaded = manager.get_chat(&chat.id).await?.into_value();
    assert_eq!(reloaded.items.len(), 1);
    assert_eq!(reloaded.total_tokens, i64::from(result.usage.total_tokens));

    Ok(())
}

#[tokio::test]
async fn test_system_prompt_append_failure_still_creates_chat() -> Result<()> {
    let database = common::create_test_database().await?;
    let manager = manager_over(FailingRepository {
        fail_roles: vec![ChatRole::System],
        ..FailingRepository::over(&database)
    });

    let outcome = manager
        .create_chat("user-1", "You are terse.", "echo")
        .await?;

    assert!(outcome.failed(Step::SystemPrompt));
    assert_eq!(outcome.diagnostics.len(), 1);

    let chat = outcome.into_value();
    assert!(chat.items.is_empty());
    assert_eq!(chat.system_prompt, "You are terse.");

    let stored = manager.get_chat(&chat.id).await?;
    assert!(stored.is_clean());
    assert_eq!(stored.value.id, chat.id);
    assert!(stored.value.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_usage_totals_failure_is_swallowed() -> Result<()> {
    let database = common::create_test_database().await?;
    let manager = manager_over(FailingRepository {
        fail_usage: true,
        ..FailingRepository::over(&database)
    });
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let outcome = manager
        .chat_completion(&chat.id, "Hello there", ChatOptions::default())
        .await?;

    assert!(outcome.failed(Step::UsageTotals));
    assert!(!outcome.failed(Step::AssistantMessage));
    assert_eq!(outcome.diagnostics.len(), 1);

    let result = outcome.into_value();
    assert_eq!(result.assistant_item.as_ref().unwrap().order, 1);

    let reloaded = manager.get_chat(&chat.id).await?.into_value();
    assert_eq!(reloaded.items.len(), 2);
    assert_eq!(reloaded.total_tokens, 0);

    Ok(())
}

#[tokio::test]
async fn test_touch_failure_keeps_appended_message() -> Result<()> {
    let database = common::create_test_database().await?;
    let manager = manager_over(FailingRepository {
        fail_touch: true,
        ..FailingRepository::over(&database)
    });
    let chat = manager.create_chat("user-1", "", "").await?.into_value();

    let outcome = manager
        .add_chat_message(&chat.id, ChatRole::User, "note to self", None)
        .await?;

    assert!(outcome.failed(Step::Touch));
    assert_eq!(outcome.value.content, "note to self");
    assert_eq!(manager.get_chat_messages(&chat.id, None, 0).await?.len(), 1);

    Ok(())
}
