// ABOUTME: Error handling re-exports from glimmer-core
// ABOUTME: Keeps crate::errors paths stable for the gateway modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # Unified Error Handling System
//!
//! The error types live in `glimmer-core` so they can be shared across the
//! workspace; this module re-exports them under `crate::errors`.

pub use glimmer_core::errors::{AppError, AppResult, ErrorCode, ErrorContext, LlmError};

