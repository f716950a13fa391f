// ABOUTME: Tests for the Ollama platform against mock HTTP servers
// ABOUTME: Covers primary/fallback retry, token accounting, model listing, and unsupported images
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use anyhow::Result;
use glimmer::config::OllamaConfig;
use glimmer::errors::ErrorCode;
use glimmer::llm::{ChatMessage, ChatParameters, DescribeImageParameters, OllamaPlatform, Platform};
use mockito::{Matcher, Server};
use serde_json::json;

mod common;

const CHAT_BODY: &str = r#"{
    "model": "llama3.2:1b",
    "message": {"role": "assistant", "content": "Hello from fallback"},
    "done": true,
    "prompt_eval_count": 12,
    "eval_count": 5
}"#;

fn config(url: String, fallback_url: Option<String>) -> OllamaConfig {
    common::init_test_logging();
    OllamaConfig {
        url,
        fallback_url,
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..OllamaConfig::default()
    }
}

#[tokio::test]
async fn test_primary_success_skips_fallback() -> Result<()> {
    let mut primary = Server::new_async().await;
    let mut fallback = Server::new_async().await;

    let primary_mock = primary
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2:1b",
            "stream": false,
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "Say hi"}
            ]
        })))
        .with_status(200)
        .with_body(CHAT_BODY)
        .expect(1)
        .create_async()
        .await;
    let fallback_mock = fallback
        .mock("POST", "/api/chat")
        .expect(0)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), Some(fallback.url())));
    let response = platform
        .chat(&ChatParameters::new("Say hi").with_system_prompt("Be brief"))
        .await?;

    assert_eq!(response.text, "Hello from fallback");
    primary_mock.assert_async().await;
    fallback_mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_fallback_used_when_primary_errors() -> Result<()> {
    let mut primary = Server::new_async().await;
    let mut fallback = Server::new_async().await;

    let primary_mock = primary
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body(r#"{"error": "model crashed"}"#)
        .expect(1)
        .create_async()
        .await;
    let fallback_mock = fallback
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(CHAT_BODY)
        .expect(1)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), Some(fallback.url())));
    let response = platform.chat(&ChatParameters::new("Say hi")).await?;

    assert_eq!(response.text, "Hello from fallback");
    // Single-turn usage is estimated at one token per four bytes
    assert_eq!(response.usage.prompt_tokens, 1);
    assert_eq!(response.usage.completion_tokens, 4);
    assert!(response.usage.cost.abs() < f64::EPSILON);
    assert!(!response.usage.cache_hit);

    primary_mock.assert_async().await;
    fallback_mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_fallback_used_when_primary_unreachable() -> Result<()> {
    let mut fallback = Server::new_async().await;
    let fallback_mock = fallback
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(CHAT_BODY)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(
        "http://127.0.0.1:9".to_owned(),
        Some(fallback.url()),
    ));
    let response = platform.chat(&ChatParameters::new("Say hi")).await?;

    assert_eq!(response.text, "Hello from fallback");
    fallback_mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_error_surfaces_without_fallback() -> Result<()> {
    let mut primary = Server::new_async().await;
    let primary_mock = primary
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body(r#"{"error": "model crashed"}"#)
        .expect(1)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), None));
    let err = platform
        .chat(&ChatParameters::new("Say hi"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceError);
    assert!(err.message.contains("model crashed"));
    assert_eq!(err.context.platform.as_deref(), Some("ollama"));
    assert_eq!(err.context.model.as_deref(), Some("llama3.2:1b"));
    primary_mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_both_endpoints_failing_surfaces_error() -> Result<()> {
    let mut primary = Server::new_async().await;
    let mut fallback = Server::new_async().await;
    primary
        .mock("POST", "/api/chat")
        .with_status(500)
        .create_async()
        .await;
    fallback
        .mock("POST", "/api/chat")
        .with_status(503)
        .with_body(r#"{"error": "overloaded"}"#)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), Some(fallback.url())));
    let err = platform
        .chat(&ChatParameters::new("Say hi"))
        .await
        .unwrap_err();

    assert!(err.message.contains("overloaded"));

    Ok(())
}

#[tokio::test]
async fn test_history_uses_server_eval_counts() -> Result<()> {
    let mut primary = Server::new_async().await;
    primary
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "how are you?"}
            ]
        })))
        .with_status(200)
        .with_body(CHAT_BODY)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), None));
    let messages = vec![
        ChatMessage::user("hi"),
        ChatMessage::assistant("hello"),
        ChatMessage::user("how are you?"),
    ];
    let response = platform
        .chat_with_history(&messages, &ChatParameters::default())
        .await?;

    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.completion_tokens, 5);
    assert_eq!(response.usage.total_tokens, 17);

    Ok(())
}

#[tokio::test]
async fn test_list_models_marks_default_and_sorts() -> Result<()> {
    let mut primary = Server::new_async().await;
    primary
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(
            r#"{"models": [
                {"name": "mistral:7b", "size": 4109865159},
                {"name": "llama3.2:1b", "size": 1321098329}
            ]}"#,
        )
        .create_async()
        .await;

    let platform = OllamaPlatform::new(config(primary.url(), None));
    let models = platform.list_models().await?;

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "llama3.2:1b");
    assert!(models[0].is_default);
    assert_eq!(models[0].size_human, "1.2 GB");
    assert_eq!(models[1].name, "mistral:7b");
    assert!(!models[1].is_default);
    assert_eq!(models[1].size_human, "3.8 GB");

    Ok(())
}

#[tokio::test]
async fn test_validation_fails_before_any_request() -> Result<()> {
    let mut primary = Server::new_async().await;
    let mock = primary
        .mock("POST", "/api/chat")
        .expect(0)
        .create_async()
        .await;

    let platform = OllamaPlatform::new(OllamaConfig {
        model: String::new(),
        ..config(primary.url(), None)
    });

    let empty = platform.chat(&ChatParameters::new("  ")).await.unwrap_err();
    assert_eq!(empty.code, ErrorCode::InvalidInput);

    let no_messages = platform
        .chat_with_history(&[], &ChatParameters::default())
        .await
        .unwrap_err();
    assert_eq!(no_messages.code, ErrorCode::InvalidInput);

    let no_model = platform.chat(&ChatParameters::new("hi")).await.unwrap_err();
    assert_eq!(no_model.code, ErrorCode::MissingRequiredField);

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_describe_image_is_not_implemented() -> Result<()> {
    let platform = OllamaPlatform::new(config("http://127.0.0.1:9".to_owned(), None));
    let err = platform
        .describe_image(&DescribeImageParameters {
            chat: ChatParameters::new("What is this?"),
            file_name: "cat.png".to_owned(),
            image: vec![1, 2, 3],
        })
        .await
        .unwrap_err();

    assert!(err.is_not_implemented());
    assert_eq!(err.http_status(), 501);

    Ok(())
}
