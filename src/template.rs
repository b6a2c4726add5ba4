// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query templates
//!
//! A template such as `Get the email and address for {entity}` is parsed once
//! per batch. Parsing yields the placeholder layout and the field names the
//! model is asked for; instantiation substitutes a row's values.
//!
//! Field names come from the literal text before the first placeholder (or,
//! failing that, after the last one): the request verb, determiners and the
//! trailing connector are dropped, and the rest is split on commas, `&`, `/`
//! and the word "and".

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::pipeline::Row;

/// Placeholder bound to the batch's entity column
pub const ENTITY_PLACEHOLDER: &str = "entity";

const REQUEST_VERBS: &[&[&str]] = &[
    &["look", "up"],
    &["give", "me"],
    &["show", "me"],
    &["tell", "me"],
    &["what", "is"],
    &["what", "are"],
    &["who", "is"],
    &["what's"],
    &["get"],
    &["find"],
    &["extract"],
    &["fetch"],
    &["retrieve"],
    &["lookup"],
    &["return"],
    &["list"],
];

const DETERMINERS: &[&str] = &["the", "a", "an", "their", "its", "his", "her"];

const CONNECTORS: &[&str] = &[
    "for", "of", "from", "at", "about", "on", "in", "by", "to", "with",
];

/// Template errors; batch-level when raised by `parse`, row-level from `instantiate`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template is empty")]
    Empty,

    #[error("Malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("Template has no placeholder (use {{entity}})")]
    NoPlaceholder,

    #[error("Could not determine which fields to extract from template '{template}'")]
    NoFields { template: String },

    #[error("Placeholder {{{name}}} has no matching column in the row")]
    UnresolvedPlaceholder { name: String },

    #[error("Value for placeholder {{{name}}} is empty")]
    EmptyValue { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed query template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    raw: String,
    segments: Vec<Segment>,
    fields: Vec<String>,
}

impl QueryTemplate {
    /// Parse a template and derive its requested fields
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        if text.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let segments = tokenize(text)?;
        if !segments.iter().any(|s| matches!(s, Segment::Placeholder(_))) {
            return Err(TemplateError::NoPlaceholder);
        }

        let fields = derive_fields(&segments);
        if fields.is_empty() {
            return Err(TemplateError::NoFields {
                template: text.to_string(),
            });
        }

        Ok(Self {
            raw: text.to_string(),
            segments,
            fields,
        })
    }

    /// The template text as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field names to extract, in template order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Distinct placeholder names, in order of first use
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute the row's values
    ///
    /// `{entity}` reads `entity_column`; any other `{name}` reads the column of
    /// that name (exact, then case-insensitive). Substituted values are
    /// inserted verbatim and never re-scanned for placeholders.
    pub fn instantiate(&self, row: &Row, entity_column: &str) -> Result<String, TemplateError> {
        let mut query = String::with_capacity(self.raw.len() + 32);

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => query.push_str(text),
                Segment::Placeholder(name) => {
                    let value = if name.eq_ignore_ascii_case(ENTITY_PLACEHOLDER) {
                        row.get(entity_column)
                    } else {
                        row.get(name).or_else(|| row.get_ignore_case(name))
                    }
                    .ok_or_else(|| TemplateError::UnresolvedPlaceholder { name: name.clone() })?;

                    let value = value.trim();
                    if value.is_empty() {
                        return Err(TemplateError::EmptyValue { name: name.clone() });
                    }
                    query.push_str(value);
                }
            }
        }

        Ok(query)
    }
}

fn tokenize(text: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    match next {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(TemplateError::Malformed {
                                position,
                                reason: "nested '{' inside placeholder".to_string(),
                            })
                        }
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::Malformed {
                        position,
                        reason: "unclosed '{'".to_string(),
                    });
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::Malformed {
                        position,
                        reason: "empty placeholder".to_string(),
                    });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            }
            '}' => {
                return Err(TemplateError::Malformed {
                    position,
                    reason: "unmatched '}' (use '}}' for a literal brace)".to_string(),
                })
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn derive_fields(segments: &[Segment]) -> Vec<String> {
    let is_placeholder = |s: &Segment| matches!(s, Segment::Placeholder(_));
    let (Some(first), Some(last)) = (
        segments.iter().position(is_placeholder),
        segments.iter().rposition(is_placeholder),
    ) else {
        return Vec::new();
    };

    let before = literal_text(&segments[..first]);
    let fields = fields_from_phrase(&before, false);
    if !fields.is_empty() {
        return fields;
    }

    let after = literal_text(&segments[last + 1..]);
    fields_from_phrase(&after, true)
}

fn literal_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::Literal(text) => Some(text.as_str()),
            Segment::Placeholder(_) => None,
        })
        .collect()
}

fn field_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\s*(?:,|&|/|\band\b)\s*").expect("valid regex"))
}

fn is_edge_punctuation(c: char) -> bool {
    matches!(c, '?' | '.' | '!' | ':' | ';' | ',' | '"' | '\'' | '’' | '-' | '(' | ')')
}

fn fields_from_phrase(phrase: &str, follows_placeholder: bool) -> Vec<String> {
    let mut phrase = phrase.to_lowercase();

    if follows_placeholder {
        // "{entity}'s CEO" leaves "'s ceo"
        let trimmed = phrase.trim_start_matches(['\'', '’']);
        phrase = match trimmed.strip_prefix('s') {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.to_string(),
            _ => trimmed.to_string(),
        };
    }

    let cleaned = phrase.trim_matches(|c: char| c.is_whitespace() || is_edge_punctuation(c));
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    while words
        .last()
        .is_some_and(|w| CONNECTORS.contains(w) || DETERMINERS.contains(w))
    {
        words.pop();
    }
    if let Some(last) = words.last_mut() {
        let word: &str = last;
        *last = ["'s", "’s"]
            .iter()
            .find_map(|suffix| word.strip_suffix(suffix))
            .unwrap_or(word);
    }

    if words.first() == Some(&"please") {
        words.remove(0);
    }
    if let Some(verb) = REQUEST_VERBS.iter().find(|verb| words.starts_with(verb)) {
        words.drain(..verb.len());
    }

    let remainder = words.join(" ");
    let mut fields: Vec<String> = Vec::new();
    for part in field_separator().split(&remainder) {
        let mut part_words: Vec<&str> = part
            .trim_matches(|c: char| c.is_whitespace() || is_edge_punctuation(c))
            .split_whitespace()
            .collect();
        while part_words.first().is_some_and(|w| DETERMINERS.contains(w)) {
            part_words.remove(0);
        }
        let field = part_words.join(" ");
        if !field.is_empty() && !fields.contains(&field) {
            fields.push(field);
        }
    }

    fields
}
