// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Language-model extraction
//!
//! Turns an instantiated query plus search context into a prompt, sends it
//! to an OpenAI-compatible chat model, and parses `field: value` answers.

pub mod client;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod types;

pub use client::ExtractionClient;
pub use openai::OpenAiCompatibleProvider;
pub use parser::{parse_fields, NOT_FOUND};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
pub use provider::LlmProvider;
pub use types::{ExtractionError, ParseError};
