// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod search;
pub mod template;
pub mod version;

// Re-export main types
pub use config::{ApiKey, EnrichmentConfig, InFlightPolicy, SearchProviderKind};
pub use errors::ProviderError;
pub use extraction::{ExtractionClient, ExtractionError, LlmProvider, ParseError};
pub use pipeline::{
    BatchError, BatchExtractor, BatchProgress, BatchSummary, Dataset, FailureStage, OutcomeKind,
    QueryRunner, ResultTable, Row, RowId, RowOutcome,
};
pub use rate_limiter::{RateLimit, RateLimiter};
pub use retry::{Retryable, RetryPolicy};
pub use search::{SearchClient, SearchError, SearchProvider, SearchResult};
pub use template::{QueryTemplate, TemplateError};
