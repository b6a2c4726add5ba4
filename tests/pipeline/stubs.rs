// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Scripted providers shared by the pipeline tests

use async_trait::async_trait;
use enrich_agent::extraction::LlmProvider;
use enrich_agent::search::{SearchProvider, SearchResult};
use enrich_agent::{Dataset, EnrichmentConfig, ProviderError, RateLimit, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub fn companies(names: &[&str]) -> Dataset {
    let mut dataset = Dataset::new(vec!["Company".to_string()]);
    for name in names {
        dataset.push(Row::from_pairs(vec![(
            "Company".to_string(),
            name.to_string(),
        )]));
    }
    dataset
}

/// Default config with caching off and limits out of the way
pub fn test_config() -> EnrichmentConfig {
    EnrichmentConfig {
        search_rate: RateLimit::new(1000, 1.0),
        llm_rate: RateLimit::new(1000, 1.0),
        search_cache_ttl_secs: 0,
        retry_backoff_base_seconds: 0.1,
        ..Default::default()
    }
}

#[derive(Default)]
pub struct ScriptedSearch {
    /// Returned for every call when set
    pub failure: Option<ProviderError>,
    /// Failures returned before the first success
    pub transient_failures: AtomicUsize,
    /// Per-entity latency; queries containing the key sleep for the value
    pub delays: HashMap<String, Duration>,
    pub default_delay: Duration,
    /// Cancelled as soon as a query containing the trigger starts
    pub cancel_on: Option<(String, CancellationToken)>,
    pub calls: AtomicUsize,
    pub started: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedSearch {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn started_queries(&self) -> Vec<String> {
        self.started.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        query: &str,
        _num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started
            .lock()
            .unwrap()
            .push((query.to_string(), Instant::now()));

        if let Some((trigger, token)) = &self.cancel_on {
            if query.contains(trigger.as_str()) {
                token.cancel();
            }
        }

        let delay = self
            .delays
            .iter()
            .find(|(key, _)| query.contains(key.as_str()))
            .map(|(_, delay)| *delay)
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Api {
                provider: "scripted".to_string(),
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        Ok(vec![
            SearchResult::new("https://one.example", format!("About {}", query)).with_title("One"),
            SearchResult::new("https://two.example", "Contact page").with_title("Two"),
        ])
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub struct ScriptedLlm {
    pub reply: String,
    pub failure: Option<ProviderError>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: ProviderError) -> Self {
        Self {
            reply: String::new(),
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        // Echo the entity so results can be told apart
        let entity = user
            .lines()
            .next()
            .and_then(|line| line.rsplit(' ').next())
            .unwrap_or_default();
        Ok(self.reply.replace("{entity}", entity))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}
