// ABOUTME: Result wrapper separating a primary value from non-fatal diagnostics
// ABOUTME: Bookkeeping failures are recorded and logged here instead of being propagated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::errors::{AppError, ErrorCode};

/// Secondary step that failed without failing the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Persisting the system prompt as the first message
    SystemPrompt,
    /// Loading the message window of a conversation
    LoadItems,
    /// Bumping a conversation's `updated_at`
    Touch,
    /// Fetching prior messages for completion context
    HistoryFetch,
    /// History-aware completion (single-turn chat was used instead)
    HistoryChat,
    /// Persisting the assistant reply
    AssistantMessage,
    /// Adding usage to the running totals
    UsageTotals,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SystemPrompt => "system_prompt",
            Self::LoadItems => "load_items",
            Self::Touch => "touch",
            Self::HistoryFetch => "history_fetch",
            Self::HistoryChat => "history_chat",
            Self::AssistantMessage => "assistant_message",
            Self::UsageTotals => "usage_totals",
        };
        f.write_str(name)
    }
}

/// One swallowed failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Which step failed
    pub step: Step,
    /// Error code of the failure
    pub code: ErrorCode,
    /// Error message
    pub message: String,
}

/// Primary value plus the diagnostics of any best-effort side effects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    /// The primary result
    pub value: T,
    /// Failures that were logged and swallowed
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    /// Wrap a value with no diagnostics
    pub const fn new(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// Record a swallowed failure and log it
    pub fn record(&mut self, step: Step, error: &AppError) {
        warn!(step = %step, code = ?error.code, "Non-fatal failure: {error}");
        self.diagnostics.push(Diagnostic {
            step,
            code: error.code,
            message: error.message.clone(),
        });
    }

    /// Whether every side effect succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether `step` failed
    #[must_use]
    pub fn failed(&self, step: Step) -> bool {
        self.diagnostics.iter().any(|d| d.step == step)
    }

    /// Append diagnostics from a nested outcome, returning its value
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.diagnostics.extend(other.diagnostics);
        other.value
    }

    /// Drop the diagnostics
    pub fn into_value(self) -> T {
        self.value
    }
}
