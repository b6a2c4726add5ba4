// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Search client: provider + rate limiting + retries + cache

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::cache::{CacheStats, SearchCache, DEFAULT_MAX_ENTRIES};
use super::provider::SearchProvider;
use super::types::{SearchError, SearchResult};
use crate::errors::ProviderError;
use crate::rate_limiter::{RateLimiter, SEARCH_KEY};
use crate::retry::RetryPolicy;

/// Default number of results requested per query
pub const DEFAULT_NUM_RESULTS: usize = 10;

/// Rate-limited, retrying front for a `SearchProvider`
pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    num_results: usize,
    cache: Option<SearchCache>,
}

impl SearchClient {
    /// Create a client without caching
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            limiter,
            retry,
            num_results: DEFAULT_NUM_RESULTS,
            cache: None,
        }
    }

    /// Number of results requested from the provider per query
    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results.max(1);
        self
    }

    /// Enable the query cache
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(SearchCache::new(ttl, DEFAULT_MAX_ENTRIES));
        self
    }

    /// Search the web for `query`
    ///
    /// Acquires the "search" rate-limit slot before every attempt. Returns the
    /// provider's results in relevance order; an empty list means the provider
    /// found nothing. With the cache enabled, concurrent calls for the same
    /// query share one provider call.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SearchError {
                query: query.to_string(),
                cause: ProviderError::InvalidRequest {
                    reason: "search query is empty".to_string(),
                },
            });
        }

        let Some(cache) = &self.cache else {
            return self.fetch(trimmed).await;
        };

        // Concurrent lookups of one query wait for the first to fill the cache
        let gate = cache.gate(trimmed);
        let _turn = gate.lock().await;

        if let Some(results) = cache.get(trimmed) {
            debug!(query = trimmed, results = results.len(), "search cache hit");
            cache.release(trimmed, &gate);
            return Ok(results);
        }

        let fetched = self.fetch(trimmed).await;
        if let Ok(results) = &fetched {
            cache.insert(trimmed, results);
        }
        cache.release(trimmed, &gate);
        fetched
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let provider = self.provider.as_ref();
        let results = self
            .retry
            .run("search", |attempt| async move {
                self.limiter.acquire(SEARCH_KEY).await;
                debug!(
                    provider = provider.name(),
                    query,
                    attempt,
                    "issuing search"
                );
                provider.search(query, self.num_results).await
            })
            .await
            .map_err(|cause| SearchError {
                query: query.to_string(),
                cause,
            })?;

        info!(
            provider = provider.name(),
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(results)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Cache statistics, if caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }
}
