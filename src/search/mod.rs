// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Web search for the enrichment pipeline
//!
//! Key features:
//! - Pluggable providers (SerpAPI, Brave)
//! - Shared sliding-window rate limiting
//! - Bounded retries for transient provider failures
//! - TTL-based query caching

pub mod brave;
pub mod cache;
pub mod client;
pub mod provider;
pub mod serpapi;
pub mod types;

use std::sync::Arc;

pub use brave::BraveSearchProvider;
pub use cache::{CacheStats, SearchCache};
pub use client::SearchClient;
pub use provider::SearchProvider;
pub use serpapi::SerpApiProvider;
pub use types::{SearchError, SearchResult};

use crate::config::{ConfigError, SearchProviderKind, SearchSettings};

/// Build the provider selected in the settings
///
/// Fails when the selected provider has no API key.
pub fn build_provider(settings: &SearchSettings) -> Result<Arc<dyn SearchProvider>, ConfigError> {
    let api_key = settings
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "no API key configured for search provider {}",
                settings.provider.as_str()
            ))
        })?;

    let provider: Arc<dyn SearchProvider> = match settings.provider {
        SearchProviderKind::SerpApi => Arc::new(
            SerpApiProvider::new(api_key, settings.timeout_ms)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        ),
        SearchProviderKind::Brave => Arc::new(
            BraveSearchProvider::new(api_key, settings.timeout_ms)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        ),
    };

    Ok(provider)
}
