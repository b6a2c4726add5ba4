// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Search provider trait definition

use async_trait::async_trait;

use super::types::SearchResult;
use crate::errors::ProviderError;

/// Trait for implementing search providers
///
/// A provider performs exactly one network call per `search` invocation.
/// Rate limiting, retries and caching are layered on top by `SearchClient`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Perform a web search
    ///
    /// # Arguments
    /// * `query` - The search query string
    /// * `num_results` - Maximum number of results to return
    ///
    /// # Returns
    /// Results in the provider's relevance order. A successful response with
    /// no hits is `Ok(vec![])`, not an error.
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    /// Get the provider name for logging
    fn name(&self) -> &'static str;

    /// Check if the provider is available (has API key, etc.)
    fn is_available(&self) -> bool {
        true
    }
}
