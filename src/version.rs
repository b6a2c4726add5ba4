// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for enrich-agent

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Capabilities of this build
pub const FEATURES: &[&str] = &[
    "serpapi-search",
    "brave-search",
    "openai-compatible-llm",
    "sliding-window-rate-limits",
    "transient-retry",
    "search-cache",
    "cancellable-batches",
];

/// Formatted version string for logging
pub fn get_version_string() -> String {
    format!("enrich-agent {}", VERSION_NUMBER)
}

/// Version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "features": FEATURES,
    })
}
