// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides logging, database, counting platform, and service helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `glimmer`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use anyhow::Result;
use async_trait::async_trait;
use glimmer::config::DatabaseConfig;
use glimmer::database::Database;
use glimmer::errors::{AppError, AppResult};
use glimmer::llm::{
    ChatMessage, ChatParameters, ChatResponse, DescribeImageParameters, DescribeImageResponse,
    EchoPlatform, LlmService, ModelInfo, Platform, PlatformType,
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard in-memory test database
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    Ok(Database::new(&DatabaseConfig::default()).await?)
}

/// Call counters shared between a test and its [`CountingPlatform`]
#[derive(Debug, Default)]
pub struct CallCounts {
    pub chat: AtomicUsize,
    pub history: AtomicUsize,
    pub image: AtomicUsize,
    pub models: AtomicUsize,
}

impl CallCounts {
    pub fn chat(&self) -> usize {
        self.chat.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> usize {
        self.history.load(Ordering::SeqCst)
    }

    pub fn image(&self) -> usize {
        self.image.load(Ordering::SeqCst)
    }

    pub fn models(&self) -> usize {
        self.models.load(Ordering::SeqCst)
    }
}

/// Echo platform that counts delegate calls and can be told to fail history chat
pub struct CountingPlatform {
    inner: EchoPlatform,
    counts: Arc<CallCounts>,
    fail_history: bool,
    no_default_model: bool,
    cost: f64,
}

impl CountingPlatform {
    pub fn new() -> (Self, Arc<CallCounts>) {
        let counts = Arc::new(CallCounts::default());
        (
            Self {
                inner: EchoPlatform::new(),
                counts: Arc::clone(&counts),
                fail_history: false,
                no_default_model: false,
                cost: 0.0,
            },
            counts,
        )
    }

    /// History chat always fails with a transport-style error
    pub fn failing_history() -> (Self, Arc<CallCounts>) {
        let (mut platform, counts) = Self::new();
        platform.fail_history = true;
        (platform, counts)
    }

    /// No configured default model; `list_models` still lists the echo model
    pub fn without_default_model() -> (Self, Arc<CallCounts>) {
        let (mut platform, counts) = Self::new();
        platform.no_default_model = true;
        (platform, counts)
    }

    /// Every response reports `cost`
    pub fn with_cost(cost: f64) -> (Self, Arc<CallCounts>) {
        let (mut platform, counts) = Self::new();
        platform.cost = cost;
        (platform, counts)
    }
}

#[async_trait]
impl Platform for CountingPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Echo
    }

    fn default_model(&self) -> &str {
        if self.no_default_model {
            ""
        } else {
            self.inner.default_model()
        }
    }

    async fn chat(&self, params: &ChatParameters) -> AppResult<ChatResponse> {
        self.counts.chat.fetch_add(1, Ordering::SeqCst);
        let mut response = self.inner.chat(params).await?;
        response.usage.cost = self.cost;
        Ok(response)
    }

    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        params: &ChatParameters,
    ) -> AppResult<ChatResponse> {
        self.counts.history.fetch_add(1, Ordering::SeqCst);
        if self.fail_history {
            return Err(AppError::external_unavailable("echo", "history backend down"));
        }
        let mut response = self.inner.chat_with_history(messages, params).await?;
        response.usage.cost = self.cost;
        Ok(response)
    }

    async fn describe_image(
        &self,
        params: &DescribeImageParameters,
    ) -> AppResult<DescribeImageResponse> {
        self.counts.image.fetch_add(1, Ordering::SeqCst);
        self.inner.describe_image(params).await
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        self.counts.models.fetch_add(1, Ordering::SeqCst);
        self.inner.list_models().await
    }
}

/// Uncached service over a platform
pub fn service_over(platform: impl Platform + 'static) -> Arc<LlmService> {
    Arc::new(LlmService::from_platform(Arc::new(platform)))
}
