// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! SerpAPI provider (Google organic results)

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::provider::SearchProvider;
use super::types::SearchResult;
use crate::config::ApiKey;
use crate::errors::{retry_after_header, ProviderError};

const SERPAPI_URL: &str = "https://serpapi.com/search";
const PROVIDER: &str = "serpapi";

/// SerpAPI search provider
pub struct SerpApiProvider {
    api_key: ApiKey,
    client: Client,
    timeout_ms: u64,
}

impl SerpApiProvider {
    /// Create a new SerpAPI provider
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
impl SearchProvider for SerpApiProvider {
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let num = num_results.min(100).to_string();
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.expose()),
                ("num", num.as_str()),
            ])
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

        let data: SerpApiResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: PROVIDER.to_string(),
            message: format!("JSON parse error: {}", e),
        })?;

        data.into_results(num_results)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, serde::Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Option<Vec<OrganicResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiResponse {
    fn into_results(self, num_results: usize) -> Result<Vec<SearchResult>, ProviderError> {
        match (self.organic_results, self.error) {
            (Some(results), _) => Ok(results
                .into_iter()
                .take(num_results)
                .map(|r| SearchResult {
                    title: r.title,
                    url: r.link,
                    snippet: r.snippet,
                })
                .collect()),
            // SerpAPI reports an empty result page as an "error" with 200 OK
            (None, Some(error)) if error.contains("hasn't returned any results") => Ok(vec![]),
            (None, Some(error)) => Err(ProviderError::Api {
                provider: PROVIDER.to_string(),
                status: 200,
                message: error,
            }),
            (None, None) => Ok(vec![]),
        }
    }
}
