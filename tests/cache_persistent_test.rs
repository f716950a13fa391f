// ABOUTME: Tests for the SQLite-backed response cache
// ABOUTME: Round-trips, TTL expiry, sweeping, condensed history rows, and uncached images
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::time::Duration;

use anyhow::Result;
use glimmer::cache::{CacheStorage, PersistentCacheStorage};
use glimmer::config::{CacheTtlConfig, DatabaseConfig};
use glimmer::database::Database;
use glimmer::llm::{
    ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse,
    Usage,
};
use sqlx::Row;

mod common;

fn response(text: &str) -> ChatResponse {
    ChatResponse {
        text: text.to_owned(),
        usage: Usage::new("gpt-4o-mini", 12, 30).with_cost(0.0042),
    }
}

async fn storage_with_ttl(ttl: Duration) -> Result<(Database, PersistentCacheStorage)> {
    let database = common::create_test_database().await?;
    let storage = PersistentCacheStorage::with_ttls(database.pool().clone(), ttl, ttl);
    Ok((database, storage))
}

#[tokio::test]
async fn test_chat_round_trip_preserves_usage() -> Result<()> {
    let (_db, storage) = storage_with_ttl(Duration::from_secs(3600)).await?;
    let params = ChatParameters::new("Say hi").with_system_prompt("Be brief");
    let key = storage.chat_key(&params, "gpt-4o-mini");

    assert!(storage.get_chat(&key).await?.is_none());

    storage.set_chat(&key, &params, &response("hi")).await?;
    let cached = storage.get_chat(&key).await?.unwrap();

    assert_eq!(cached.text, "hi");
    assert_eq!(cached.usage.model_name, "gpt-4o-mini");
    assert_eq!(cached.usage.prompt_tokens, 12);
    assert_eq!(cached.usage.completion_tokens, 30);
    assert_eq!(cached.usage.total_tokens, 42);
    assert!((cached.usage.cost - 0.0042).abs() < 1e-12);
    assert!(!cached.usage.cache_hit);

    Ok(())
}

#[tokio::test]
async fn test_upsert_replaces_existing_row() -> Result<()> {
    let (db, storage) = storage_with_ttl(Duration::from_secs(3600)).await?;
    let params = ChatParameters::new("Say hi");
    let key = storage.chat_key(&params, "echo");

    storage.set_chat(&key, &params, &response("first")).await?;
    storage.set_chat(&key, &params, &response("second")).await?;

    assert_eq!(storage.get_chat(&key).await?.unwrap().text, "second");
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM llm_responses")
        .fetch_one(db.pool())
        .await?
        .get("n");
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn test_expired_row_is_deleted_on_read() -> Result<()> {
    let (db, storage) = storage_with_ttl(Duration::from_secs(1)).await?;
    let params = ChatParameters::new("Say hi");
    let key = storage.chat_key(&params, "echo");

    storage.set_chat(&key, &params, &response("hi")).await?;
    assert!(storage.get_chat(&key).await?.is_some());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(storage.get_chat(&key).await?.is_none());
    assert!(storage.get_chat(&key).await?.is_none());

    let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM llm_responses")
        .fetch_one(db.pool())
        .await?
        .get("n");
    assert_eq!(remaining, 0);
    assert_eq!(storage.clean_expired().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_sub_second_ttl_expires() -> Result<()> {
    let (db, storage) = storage_with_ttl(Duration::from_millis(200)).await?;
    let params = ChatParameters::new("short lived");
    let key = storage.chat_key(&params, "echo");

    storage.set_chat(&key, &params, &response("t")).await?;
    let ttl_ms: i64 = sqlx::query("SELECT ttl_ms FROM llm_responses WHERE key = $1")
        .bind(&key)
        .fetch_one(db.pool())
        .await?
        .get("ttl_ms");
    assert_eq!(ttl_ms, 200);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(storage.get_chat(&key).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_unbounded_ttl_never_expires() -> Result<()> {
    let (_db, storage) = storage_with_ttl(Duration::from_secs(u64::MAX)).await?;
    let params = ChatParameters::new("keep forever");
    let key = storage.chat_key(&params, "echo");

    storage.set_chat(&key, &params, &response("forever")).await?;

    assert_eq!(storage.get_chat(&key).await?.unwrap().text, "forever");
    assert_eq!(storage.clean_expired().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_clean_expired_deletes_only_stale_rows() -> Result<()> {
    let database = common::create_test_database().await?;
    let stale = PersistentCacheStorage::with_ttls(
        database.pool().clone(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );
    let fresh = PersistentCacheStorage::new(database.pool().clone(), &CacheTtlConfig::default());

    for prompt in ["a", "b", "c"] {
        let params = ChatParameters::new(prompt);
        stale
            .set_chat(&stale.chat_key(&params, "echo"), &params, &response(prompt))
            .await?;
    }
    let keep = ChatParameters::new("keep");
    let keep_key = fresh.chat_key(&keep, "echo");
    fresh.set_chat(&keep_key, &keep, &response("keep")).await?;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(stale.clean_expired().await?, 3);
    assert_eq!(stale.clean_expired().await?, 0);
    assert_eq!(fresh.get_chat(&keep_key).await?.unwrap().text, "keep");

    Ok(())
}

#[tokio::test]
async fn test_history_row_stores_condensed_introspection_fields() -> Result<()> {
    let (db, storage) = storage_with_ttl(Duration::from_secs(3600)).await?;
    let messages = vec![
        ChatMessage::user("first question"),
        ChatMessage::assistant("first answer"),
        ChatMessage::user("x".repeat(1500)),
    ];
    let params = ChatParameters::default().with_system_prompt("Be brief");
    let key = storage.history_key(&messages, &params, "echo");

    storage
        .set_history(&key, &messages, &params, &response("reply"))
        .await?;
    assert_eq!(storage.get_history(&key).await?.unwrap().text, "reply");

    let row = sqlx::query("SELECT prompt, system_prompt FROM llm_responses WHERE key = $1")
        .bind(&key)
        .fetch_one(db.pool())
        .await?;
    let prompt: String = row.get("prompt");
    let system_prompt: String = row.get("system_prompt");

    assert_eq!(prompt.chars().count(), 1000);
    assert!(prompt.chars().all(|c| c == 'x'));
    assert_eq!(system_prompt, "[history: 3 messages] Be brief");

    Ok(())
}

#[tokio::test]
async fn test_images_are_never_cached() -> Result<()> {
    let (db, storage) = storage_with_ttl(Duration::from_secs(3600)).await?;
    let params = DescribeImageParameters {
        chat: ChatParameters::new("What is this?"),
        file_name: "cat.png".to_owned(),
        image: vec![0x89, 0x50, 0x4e, 0x47],
    };
    let key = storage.image_key(&params, "gpt-4o-mini");
    let description = DescribeImageResponse {
        text: "a cat".to_owned(),
        usage: Usage::new("gpt-4o-mini", 100, 5),
    };

    storage.set_image(&key, &params, &description).await?;
    assert!(storage.get_image(&key).await?.is_none());

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM llm_responses")
        .fetch_one(db.pool())
        .await?
        .get("n");
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn test_cache_survives_reopening_file_database() -> Result<()> {
    common::init_test_logging();
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig {
        url: format!("sqlite:{}", dir.path().join("cache.db").display()),
        max_connections: 2,
    };
    let params = ChatParameters::new("persist me");

    let key = {
        let database = Database::new(&config).await?;
        let storage =
            PersistentCacheStorage::new(database.pool().clone(), &CacheTtlConfig::default());
        let key = storage.chat_key(&params, "echo");
        storage.set_chat(&key, &params, &response("stored")).await?;
        database.pool().close().await;
        key
    };

    let database = Database::new(&config).await?;
    let storage = PersistentCacheStorage::new(database.pool().clone(), &CacheTtlConfig::default());
    assert_eq!(storage.get_chat(&key).await?.unwrap().text, "stored");

    Ok(())
}
