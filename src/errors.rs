// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Errors raised by the outbound API providers (search and LLM)
//!
//! Both clients share one classification so the retry policy can decide
//! whether a failure is worth another attempt.

use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// A single failed call to an external provider
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider answered 429
    #[error("{provider} rate limited the request")]
    RateLimited {
        provider: String,
        /// Value of the Retry-After header, if any
        retry_after_secs: Option<u64>,
    },

    /// Non-success HTTP status other than 401/403/429
    #[error("{provider} API error: {status} - {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Request did not complete within the client timeout
    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// Connection-level failure before any status was received
    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },

    /// Credentials missing or rejected (401/403)
    #[error("{provider} rejected the credentials")]
    Unauthorized { provider: String },

    /// Body could not be decoded into the expected shape
    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },

    /// The request itself is unusable (e.g. empty query)
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl ProviderError {
    /// Classify a non-success HTTP status
    pub fn from_status(
        provider: &str,
        status: u16,
        retry_after_secs: Option<u64>,
        body: String,
    ) -> Self {
        match status {
            429 => ProviderError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            },
            401 | 403 => ProviderError::Unauthorized {
                provider: provider.to_string(),
            },
            _ => ProviderError::Api {
                provider: provider.to_string(),
                status,
                message: body,
            },
        }
    }

    /// Classify a reqwest send error
    pub fn from_reqwest(provider: &str, err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                timeout_ms,
            }
        } else if err.is_decode() {
            ProviderError::Malformed {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl Retryable for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout { .. }
            | ProviderError::Transport { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Unauthorized { .. }
            | ProviderError::Malformed { .. }
            | ProviderError::InvalidRequest { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Parse a Retry-After header given in whole seconds
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
