// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-row pipeline: template, search, prompt, model, parse

use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{ExtractionRequest, ExtractionResult, FailureStage, Row, RowId, RowOutcome};
use crate::config::{ConfigError, EnrichmentConfig};
use crate::extraction::{parse_fields, ExtractionClient, LlmProvider, OpenAiCompatibleProvider};
use crate::rate_limiter::RateLimiter;
use crate::search::{build_provider, SearchClient, SearchProvider};
use crate::template::QueryTemplate;

/// Default number of search results forwarded to the model
pub const DEFAULT_TOP_K: usize = 5;

/// Processes one row end to end
pub struct QueryRunner {
    search: SearchClient,
    extraction: ExtractionClient,
    top_k: usize,
}

impl QueryRunner {
    pub fn new(search: SearchClient, extraction: ExtractionClient) -> Self {
        Self {
            search,
            extraction,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Build the production runner: providers, one shared limiter, retries and cache
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let search = build_provider(&config.search)?;
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(&config.llm)?);
        Ok(Self::with_providers(search, llm, config))
    }

    /// Build a runner around the given providers, wired as `from_config` would
    pub fn with_providers(
        search: Arc<dyn SearchProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &EnrichmentConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::for_clients(config.search_rate, config.llm_rate));
        let retry = config.retry_policy();

        let mut search_client = SearchClient::new(search, limiter.clone(), retry.clone())
            .with_num_results(config.search.num_results);
        if let Some(ttl) = config.search_cache_ttl() {
            search_client = search_client.with_cache(ttl);
        }
        let extraction = ExtractionClient::new(llm, limiter, retry);

        Self::new(search_client, extraction).with_top_k(config.top_k_results)
    }

    pub fn search_client(&self) -> &SearchClient {
        &self.search
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run every step for one row
    ///
    /// Never returns an error: each failure is reported as an outcome tagged
    /// with the stage that produced it.
    pub async fn process(
        &self,
        row_id: RowId,
        row: &Row,
        entity_column: &str,
        template: &QueryTemplate,
    ) -> RowOutcome {
        let entity = row.get(entity_column).unwrap_or_default().trim().to_string();
        let fail = |stage: FailureStage, reason: String| {
            warn!(row_id = row_id.0, entity = %entity, stage = %stage, reason = %reason, "row failed");
            RowOutcome::failure(row_id, entity.clone(), stage, reason)
        };

        let query = match template.instantiate(row, entity_column) {
            Ok(query) => query,
            Err(e) => return fail(FailureStage::Template, e.to_string()),
        };

        let search_results = match self.search.search(&query).await {
            Ok(results) => results,
            Err(e) => return fail(FailureStage::Search, e.to_string()),
        };
        debug!(row_id = row_id.0, results = search_results.len(), "search results received");

        let request = ExtractionRequest {
            row_id,
            instantiated_query: query,
            search_results,
        };
        let prompt = request.prompt(template.fields(), self.top_k);

        let text = match self.extraction.extract(&prompt).await {
            Ok(text) => text,
            Err(e) => return fail(FailureStage::Llm, e.to_string()),
        };

        let fields = match parse_fields(&text, template.fields()) {
            Ok(fields) => fields,
            Err(e) => return fail(FailureStage::Parse, e.to_string()),
        };

        debug!(row_id = row_id.0, entity = %entity, ?fields, "row extracted");
        RowOutcome::Success(ExtractionResult {
            row_id,
            sources: request.sources(self.top_k),
            query: request.instantiated_query,
            entity,
            fields,
        })
    }
}
