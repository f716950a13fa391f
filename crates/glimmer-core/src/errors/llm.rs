// ABOUTME: Gateway-specific error types for language-model backends
// ABOUTME: Separates validation, transport, API, and unsupported-capability failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors

//! # LLM Error Types
//!
//! Structured errors raised by platform implementations:
//! - validation failures (`EmptyPrompt`, `NoMessages`, `ModelNotSpecified`, `MissingImage`)
//!   are local and never retried
//! - `Transport` failures trigger the fallback-endpoint retry where one is configured
//! - `NotImplemented` lets callers decide whether to try another backend

use thiserror::Error;

use super::{AppError, ErrorCode};

/// Errors raised by language-model platforms
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Single-turn chat called without a prompt
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// History chat called with an empty message list
    #[error("at least one message is required")]
    NoMessages,

    /// Neither the call nor the platform configuration named a model
    #[error("no model specified and {platform} has no default model configured")]
    ModelNotSpecified {
        /// Platform that could not resolve a model
        platform: &'static str,
    },

    /// Image description called without image data
    #[error("image data is required for image description")]
    MissingImage,

    /// The platform does not support the requested capability
    #[error("{capability} is not implemented by the {platform} platform")]
    NotImplemented {
        /// Platform name
        platform: &'static str,
        /// Capability that was requested
        capability: &'static str,
    },

    /// Network or timeout failure talking to the backend
    #[error("{platform} transport error at {endpoint}: {message}")]
    Transport {
        /// Platform name
        platform: &'static str,
        /// Endpoint that was dialed
        endpoint: String,
        /// Underlying failure
        message: String,
    },

    /// The backend answered with a non-success status
    #[error("{platform} returned HTTP {status}: {message}")]
    Api {
        /// Platform name
        platform: &'static str,
        /// HTTP status code
        status: u16,
        /// Error body or message extracted from it
        message: String,
    },

    /// The backend rejected the configured credentials
    #[error("{platform} rejected the configured credentials")]
    InvalidCredentials {
        /// Platform name
        platform: &'static str,
    },

    /// The backend is rate limiting requests
    #[error("{platform} rate limit reached: {message}")]
    RateLimited {
        /// Platform name
        platform: &'static str,
        /// Message returned by the backend
        message: String,
    },

    /// The backend answered with a body we could not interpret
    #[error("{platform} returned an unreadable response: {message}")]
    InvalidResponse {
        /// Platform name
        platform: &'static str,
        /// Parse failure detail
        message: String,
    },
}

impl LlmError {
    /// Create a transport error
    pub fn transport(
        platform: &'static str,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            platform,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported capability error
    #[must_use]
    pub const fn not_implemented(platform: &'static str, capability: &'static str) -> Self {
        Self::NotImplemented {
            platform,
            capability,
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(platform: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            platform,
            message: message.into(),
        }
    }

    /// Whether this is a network-level failure eligible for fallback retry
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether this is a local validation failure
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyPrompt | Self::NoMessages | Self::ModelNotSpecified { .. } | Self::MissingImage
        )
    }

    /// The platform associated with this error, when known
    #[must_use]
    pub const fn platform(&self) -> Option<&'static str> {
        match self {
            Self::ModelNotSpecified { platform }
            | Self::NotImplemented { platform, .. }
            | Self::Transport { platform, .. }
            | Self::Api { platform, .. }
            | Self::InvalidCredentials { platform }
            | Self::RateLimited { platform, .. }
            | Self::InvalidResponse { platform, .. } => Some(*platform),
            Self::EmptyPrompt | Self::NoMessages | Self::MissingImage => None,
        }
    }

    /// The error code this failure maps to
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyPrompt | Self::NoMessages | Self::MissingImage => ErrorCode::InvalidInput,
            Self::ModelNotSpecified { .. } => ErrorCode::MissingRequiredField,
            Self::NotImplemented { .. } => ErrorCode::NotImplemented,
            Self::Transport { .. } => ErrorCode::ExternalServiceUnavailable,
            Self::Api { .. } | Self::InvalidResponse { .. } => ErrorCode::ExternalServiceError,
            Self::InvalidCredentials { .. } => ErrorCode::ExternalAuthFailed,
            Self::RateLimited { .. } => ErrorCode::ExternalRateLimited,
        }
    }

    /// Classify a `reqwest` failure for the given platform and endpoint
    #[cfg(feature = "provider-errors")]
    #[must_use]
    pub fn from_reqwest(platform: &'static str, endpoint: &str, error: &reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::invalid_response(platform, error.to_string());
        }
        if let Some(status) = error.status() {
            return Self::Api {
                platform,
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        let message = if error.is_timeout() {
            format!("request timed out: {error}")
        } else if error.is_connect() {
            format!("cannot connect: {error}")
        } else {
            error.to_string()
        };
        Self::transport(platform, endpoint, message)
    }
}

impl From<LlmError> for AppError {
    fn from(error: LlmError) -> Self {
        let platform = error.platform();
        let app_error = Self::new(error.code(), error.to_string());
        let app_error = match platform {
            Some(name) => app_error.with_platform(name),
            None => app_error,
        };
        app_error.with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retryable_and_validation_is_not() {
        let transport = LlmError::transport("ollama", "http://localhost:11434", "refused");
        assert!(transport.is_transport());
        assert!(!transport.is_validation());
        assert!(LlmError::EmptyPrompt.is_validation());
        assert!(!LlmError::EmptyPrompt.is_transport());
    }

    #[test]
    fn test_not_implemented_maps_to_distinct_code() {
        let error: AppError = LlmError::not_implemented("ollama", "describe_image").into();
        assert_eq!(error.code, ErrorCode::NotImplemented);
        assert!(error.is_not_implemented());
        assert_eq!(error.context.platform.as_deref(), Some("ollama"));
    }
}
