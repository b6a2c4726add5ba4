// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for extraction

use thiserror::Error;

use crate::errors::ProviderError;

/// The language model call failed after retries, or failed permanently
#[derive(Debug, Clone, Error)]
#[error("Extraction failed: {cause}")]
pub struct ExtractionError {
    /// Prompt that was sent
    pub prompt: String,
    #[source]
    pub cause: ProviderError,
}

/// No requested field could be located in the model's response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No requested field ({}) found in model response: {:?}", .fields.join(", "), .excerpt)]
pub struct ParseError {
    pub fields: Vec<String>,
    /// Leading part of the response, for failure reports
    pub excerpt: String,
}
