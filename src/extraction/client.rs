// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Extraction client: LLM provider + rate limiting + retries

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::prompt::SYSTEM_PROMPT;
use super::provider::LlmProvider;
use super::types::ExtractionError;
use crate::rate_limiter::{RateLimiter, LLM_KEY};
use crate::retry::RetryPolicy;

/// Rate-limited, retrying front for an `LlmProvider`
pub struct ExtractionClient {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    system_prompt: String,
}

impl ExtractionClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            limiter,
            retry,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the default system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Send `prompt` to the model and return its raw text
    ///
    /// Acquires the "llm" rate-limit slot before every attempt.
    pub async fn extract(&self, prompt: &str) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let provider = self.provider.as_ref();
        let system_prompt = self.system_prompt.as_str();

        let text = self
            .retry
            .run("llm", |attempt| async move {
                self.limiter.acquire(LLM_KEY).await;
                debug!(
                    provider = provider.name(),
                    model = provider.model(),
                    attempt,
                    prompt_chars = prompt.len(),
                    "requesting completion"
                );
                provider.complete(system_prompt, prompt).await
            })
            .await
            .map_err(|cause| ExtractionError {
                prompt: prompt.to_string(),
                cause,
            })?;

        info!(
            model = provider.model(),
            response_chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        Ok(text)
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }
}
