// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Brave Search API provider
//!
//! Implements web search using the Brave Search API.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::provider::SearchProvider;
use super::types::SearchResult;
use crate::config::ApiKey;
use crate::errors::{retry_after_header, ProviderError};

const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const PROVIDER: &str = "brave";

/// Brave Search API provider
pub struct BraveSearchProvider {
    api_key: ApiKey,
    client: Client,
    timeout_ms: u64,
}

impl BraveSearchProvider {
    /// Create a new Brave Search provider
    ///
    /// # Arguments
    /// * `api_key` - Brave Search API key
    /// * `timeout_ms` - Per-request timeout
    pub fn new(api_key: ApiKey, timeout_ms: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, &e, timeout_ms))?;

        Ok(Self {
            api_key,
            client,
            timeout_ms,
        })
    }
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let response = self
            .client
            .get(BRAVE_API_URL)
            .header("X-Subscription-Token", self.api_key.expose())
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", &num_results.min(20).to_string())])
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

        let data: BraveResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: PROVIDER.to_string(),
            message: format!("JSON parse error: {}", e),
        })?;

        Ok(data.into_results(num_results))
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, serde::Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, serde::Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, serde::Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

impl BraveResponse {
    fn into_results(self, num_results: usize) -> Vec<SearchResult> {
        self.web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .take(num_results)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.description,
            })
            .collect()
    }
}
