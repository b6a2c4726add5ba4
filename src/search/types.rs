// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for web search functionality

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ProviderError;

/// A single search result from a web search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Title of the search result (may be empty)
    #[serde(default)]
    pub title: String,
    /// URL of the search result
    pub url: String,
    /// Snippet/description of the search result
    pub snippet: String,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Search failed after retries were exhausted, or failed permanently
#[derive(Debug, Clone, Error)]
#[error("Search failed for '{query}': {cause}")]
pub struct SearchError {
    pub query: String,
    #[source]
    pub cause: ProviderError,
}
