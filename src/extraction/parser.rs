// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Parsing `field: value` answers out of free-form model text

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

use super::types::ParseError;

/// Value recorded for a requested field the model could not find
pub const NOT_FOUND: &str = "not found";

const NOT_FOUND_PHRASES: &[&str] = &[
    "not found",
    "n/a",
    "na",
    "none",
    "unknown",
    "not available",
    "not provided",
    "null",
    "-",
];

/// Openers of replies that decline rather than answer
const REFUSAL_MARKERS: &[&str] = &[
    "sorry",
    "i could not",
    "i couldn't",
    "i cannot",
    "i can't",
    "i was unable",
    "unable to",
    "as an ai",
];

/// Longest sentence-punctuated line still read as a bare value, e.g. "Acme Holdings Inc."
const BARE_VALUE_MAX_WORDS: usize = 3;

const EXCERPT_CHARS: usize = 200;

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^\s*(?:[-*•]+|\d+[.)])\s*").expect("valid regex"))
}

/// Extract the requested fields from `text`
///
/// Fields the model did not answer are set to [`NOT_FOUND`]. Fails only when
/// none of the fields can be located. A lone requested field may be answered
/// by a single bare line; a refusal or a full sentence is not an answer.
pub fn parse_fields(text: &str, fields: &[String]) -> Result<IndexMap<String, String>, ParseError> {
    let candidates: Vec<Candidate> = text
        .split(['\n', ';'])
        .filter_map(|segment| {
            let cleaned = clean_segment(segment);
            let (key, value) = cleaned.split_once(':')?;
            let key = normalize_key(key);
            (!key.is_empty()).then(|| Candidate {
                key,
                blank: value.trim().is_empty(),
                value: clean_value(value),
            })
        })
        .collect();

    let mut found: IndexMap<String, Option<String>> =
        fields.iter().map(|f| (normalize_key(f), None)).collect();
    let mut used = vec![false; candidates.len()];

    // Exact key matches take priority
    for (field, slot) in found.iter_mut() {
        if let Some(i) = candidates.iter().position(|c| &c.key == field) {
            *slot = Some(candidates[i].value.clone());
            used[i] = true;
        }
    }

    // Then keys that contain the field name or are contained in it; a lead-in
    // such as "Here is the email:" carries no value and is skipped
    for (field, slot) in found.iter_mut().filter(|(_, slot)| slot.is_none()) {
        if let Some(i) = candidates.iter().enumerate().position(|(i, c)| {
            !used[i]
                && !c.blank
                && c.key.len() > 1
                && (c.key.contains(field.as_str()) || field.contains(c.key.as_str()))
        }) {
            *slot = Some(candidates[i].value.clone());
            used[i] = true;
        }
    }

    // A lone field may be answered by one bare line without a key
    if found.len() == 1 && found.values().all(Option::is_none) {
        if let (Some(line), Some(slot)) = (bare_answer(text), found.values_mut().next()) {
            *slot = Some(clean_value(&line));
        }
    }

    if found.values().all(Option::is_none) {
        return Err(ParseError {
            fields: fields.to_vec(),
            excerpt: text.trim().chars().take(EXCERPT_CHARS).collect(),
        });
    }

    Ok(fields
        .iter()
        .map(|field| {
            let value = found
                .get(&normalize_key(field))
                .cloned()
                .flatten()
                .unwrap_or_else(|| NOT_FOUND.to_string());
            (field.clone(), value)
        })
        .collect())
}

struct Candidate {
    key: String,
    value: String,
    blank: bool,
}

/// The reply's only content line, if it reads as a value
fn bare_answer(text: &str) -> Option<String> {
    let mut lines = text
        .lines()
        .map(clean_segment)
        .filter(|line| !line.is_empty() && !line.ends_with(':'));
    let line = lines.next()?;
    if lines.next().is_some() {
        return None;
    }

    let lowered = line.to_lowercase();
    if REFUSAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return None;
    }
    let sentence = line.ends_with(['.', '!', '?'])
        && line.split_whitespace().count() > BARE_VALUE_MAX_WORDS;
    (!sentence).then_some(line)
}

fn clean_segment(segment: &str) -> String {
    let without_marker = list_marker().replace(segment, "");
    without_marker.replace("**", "").replace('`', "").trim().to_string()
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_value(value: &str) -> String {
    let trimmed = value
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed).trim();

    let lowered = trimmed.to_lowercase();
    if trimmed.is_empty() || NOT_FOUND_PHRASES.contains(&lowered.as_str()) {
        NOT_FOUND.to_string()
    } else {
        trimmed.to_string()
    }
}
