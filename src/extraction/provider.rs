// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Language model provider trait

use async_trait::async_trait;

use crate::errors::ProviderError;

/// A chat-completion backend
///
/// One `complete` call is one network request; `ExtractionClient` adds rate
/// limiting and retries.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a system + user prompt pair and return the model's raw text
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;
}
