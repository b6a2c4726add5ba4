// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for enrichment runs
//!
//! Every option has a default, so an empty TOML file (or none at all) yields
//! a usable configuration once API keys are supplied. The pipeline itself
//! never reads the environment; front-ends pass `env_lookup` to `apply_overrides`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::rate_limiter::RateLimit;
use crate::retry::RetryPolicy;

/// Default Groq endpoint (OpenAI-compatible)
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Default extraction model
pub const DEFAULT_LLM_MODEL: &str = "mixtral-8x7b-32768";

/// Configuration errors, detected before any row is processed
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// An API credential; never shown in `Debug` output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building request headers
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// What happens to rows already in flight when a batch is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Let in-flight rows finish and keep their outcomes
    #[default]
    Complete,
    /// Drop in-flight rows immediately; they are reported as skipped
    Abandon,
}

/// Which web search API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    SerpApi,
    Brave,
}

impl SearchProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchProviderKind::SerpApi => "serpapi",
            SearchProviderKind::Brave => "brave",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn key_env_var(&self) -> &'static str {
        match self {
            SearchProviderKind::SerpApi => "SERP_API_KEY",
            SearchProviderKind::Brave => "BRAVE_API_KEY",
        }
    }
}

impl FromStr for SearchProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serpapi" | "serp" | "google" => Ok(SearchProviderKind::SerpApi),
            "brave" => Ok(SearchProviderKind::Brave),
            other => Err(ConfigError::Invalid(format!(
                "unknown search provider '{}' (expected serpapi or brave)",
                other
            ))),
        }
    }
}

/// Search provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub provider: SearchProviderKind,
    pub api_key: Option<ApiKey>,
    /// Results requested from the provider per query
    pub num_results: usize,
    pub timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::SerpApi,
            api_key: None,
            num_results: 10,
            timeout_ms: 10_000,
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<ApiKey>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 512,
            timeout_ms: 60_000,
        }
    }
}

/// Top-level configuration for an enrichment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub search_rate: RateLimit,
    pub llm_rate: RateLimit,
    /// Leading search results forwarded to the model
    pub top_k_results: usize,
    /// Rows processed in parallel
    pub concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_base_seconds: f64,
    pub in_flight: InFlightPolicy,
    /// 0 disables the search cache
    pub search_cache_ttl_secs: u64,
    pub search: SearchSettings,
    pub llm: LlmSettings,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            search_rate: RateLimit::new(15, 60.0),
            llm_rate: RateLimit::new(30, 60.0),
            top_k_results: 5,
            concurrency: 3,
            retry_max_attempts: 3,
            retry_backoff_base_seconds: 1.0,
            in_flight: InFlightPolicy::Complete,
            search_cache_ttl_secs: 3600,
            search: SearchSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl EnrichmentConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay environment-style values; `lookup` maps variable names to values
    /// ([`env_lookup`] reads the process environment)
    ///
    /// Recognized: SERP_API_KEY, BRAVE_API_KEY, GROQ_API_KEY (or LLM_API_KEY),
    /// LLM_BASE_URL, LLM_MODEL, SEARCH_PROVIDER, ENRICH_CONCURRENCY.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("SEARCH_PROVIDER") {
            self.search.provider = provider.parse()?;
        }

        if self.search.api_key.is_none() {
            self.search.api_key = lookup(self.search.provider.key_env_var()).map(ApiKey::new);
        }

        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("GROQ_API_KEY")
                .or_else(|| lookup("LLM_API_KEY"))
                .map(ApiKey::new);
        }

        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(concurrency) = lookup("ENRICH_CONCURRENCY") {
            self.concurrency = concurrency.trim().parse().map_err(|_| {
                invalid(&format!("ENRICH_CONCURRENCY is not a number: {}", concurrency))
            })?;
        }

        Ok(())
    }

    /// Switch search provider, picking up its key via `lookup` when set
    pub fn set_search_provider<F>(&mut self, provider: SearchProviderKind, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if provider == self.search.provider {
            return;
        }
        self.search.provider = provider;
        if let Some(key) = lookup(provider.key_env_var()) {
            self.search.api_key = Some(ApiKey::new(key));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rate("search_rate", &self.search_rate)?;
        validate_rate("llm_rate", &self.llm_rate)?;

        if self.top_k_results == 0 {
            return Err(invalid("top_k_results must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.retry_max_attempts == 0 {
            return Err(invalid("retry_max_attempts must be at least 1"));
        }
        if !self.retry_backoff_base_seconds.is_finite() || self.retry_backoff_base_seconds < 0.0 {
            return Err(invalid("retry_backoff_base_seconds must be a non-negative number"));
        }
        if self.search.num_results == 0 {
            return Err(invalid("search.num_results must be at least 1"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model must not be empty"));
        }

        let url = url::Url::parse(&self.llm.base_url)
            .map_err(|e| invalid(&format!("llm.base_url is not a valid URL: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("llm.base_url must use http or https"));
        }

        Ok(())
    }

    /// Retry policy shared by both clients
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::try_from_secs_f64(self.retry_backoff_base_seconds).unwrap_or(Duration::ZERO),
        )
    }

    /// Search cache TTL, `None` when caching is disabled
    pub fn search_cache_ttl(&self) -> Option<Duration> {
        (self.search_cache_ttl_secs > 0).then(|| Duration::from_secs(self.search_cache_ttl_secs))
    }
}

fn validate_rate(name: &str, rate: &RateLimit) -> Result<(), ConfigError> {
    if rate.max_calls == 0 {
        return Err(invalid(&format!("{}.max_calls must be at least 1", name)));
    }
    if !rate.window_seconds.is_finite() || rate.window_seconds <= 0.0 {
        return Err(invalid(&format!(
            "{}.window_seconds must be a positive number",
            name
        )));
    }
    Ok(())
}

/// Process environment as an override source
pub fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
