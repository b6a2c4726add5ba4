// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt construction for field extraction

use crate::search::SearchResult;

use super::parser::NOT_FOUND;

/// System message sent with every extraction request
pub const SYSTEM_PROMPT: &str = "You are a data extraction assistant. You are given a question \
about a single entity together with web search results. Use only the search results to answer, \
be concise, and reply in exactly the format the user asks for.";

/// Build the user prompt for one row
///
/// Only the first `top_k` results are included, in the order given.
pub fn build_prompt(
    query: &str,
    results: &[SearchResult],
    fields: &[String],
    top_k: usize,
) -> String {
    let mut prompt = format!("Question: {}\n\n", query.trim());

    let context: Vec<&SearchResult> = results.iter().take(top_k).collect();
    if context.is_empty() {
        prompt.push_str("Web search results: none were found.\n\n");
    } else {
        prompt.push_str("Web search results:\n");
        for (i, result) in context.iter().enumerate() {
            let title = one_line(&result.title);
            if title.is_empty() {
                prompt.push_str(&format!("[{}]\n", i + 1));
            } else {
                prompt.push_str(&format!("[{}] {}\n", i + 1, title));
            }
            prompt.push_str(&format!("URL: {}\n", result.url.trim()));
            prompt.push_str(&format!("Snippet: {}\n\n", one_line(&result.snippet)));
        }
    }

    prompt.push_str(
        "Using only the search results above, answer with one line per field in the form `field: value`:\n",
    );
    for field in fields {
        prompt.push_str(&format!("{}: <value>\n", field));
    }
    prompt.push_str(&format!(
        "If a value does not appear in the search results, write `{}` as the value. Do not add any other text.",
        NOT_FOUND
    ));

    prompt
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
