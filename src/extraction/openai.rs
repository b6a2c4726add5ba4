// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! LLM provider for OpenAI-compatible chat completion APIs (Groq by default)

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::provider::LlmProvider;
use crate::config::{ApiKey, ConfigError, LlmSettings};
use crate::errors::{retry_after_header, ProviderError};

const PROVIDER: &str = "openai-compatible";

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER.to_string(),
                message: "response contained no choices".to_string(),
            })
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_ms: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from the LLM settings; requires an API key
    pub fn new(settings: &LlmSettings) -> Result<Self, ConfigError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Invalid("no API key configured for the LLM".to_string()))?;

        let base = settings.base_url.trim_end_matches('/');
        url::Url::parse(base)
            .map_err(|e| ConfigError::Invalid(format!("invalid LLM base URL '{}': {}", base, e)))?;
        let endpoint = format!("{}/chat/completions", base);

        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        info!(
            "LLM client configured: endpoint={}, model={}",
            endpoint, settings.model
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_ms: settings.timeout_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&self.request(system_prompt, user_prompt))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, &e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                PROVIDER,
                status.as_u16(),
                retry_after,
                message,
            ));
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER.to_string(),
                message: format!("JSON parse error: {}", e),
            })?;

        chat_response.into_text()
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}
