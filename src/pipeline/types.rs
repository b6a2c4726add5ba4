// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Data model for batch enrichment

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::extraction::build_prompt;
use crate::search::SearchResult;

/// Zero-based position of a row in its dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub usize);

impl RowId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One dataset row: column name to cell value, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: IndexMap<String, String>,
}

impl Row {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            cells: pairs.into_iter().collect(),
        }
    }

    /// Cell value by exact column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Cell value by column name, ignoring case
    pub fn get_ignore_case(&self, column: &str) -> Option<&str> {
        let wanted = column.to_lowercase();
        self.cells
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }
}

/// Ordered, read-only input rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from a header and positional records
    ///
    /// Short records are padded with empty cells; extra cells are dropped.
    pub fn from_records<I, R>(columns: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = String>,
    {
        let mut dataset = Self::new(columns);
        for record in records {
            let mut values = record.into_iter();
            let row = Row::from_pairs(
                dataset
                    .columns
                    .iter()
                    .map(|column| (column.clone(), values.next().unwrap_or_default())),
            );
            dataset.rows.push(row);
        }
        dataset
    }

    /// Append a row; columns it introduces are added to the header
    pub fn push(&mut self, row: Row) {
        for column in row.columns() {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push(column.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-row input to the model, built after the search step
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub row_id: RowId,
    pub instantiated_query: String,
    pub search_results: Vec<SearchResult>,
}

impl ExtractionRequest {
    /// User prompt for the requested fields using the first `top_k` results
    pub fn prompt(&self, fields: &[String], top_k: usize) -> String {
        build_prompt(&self.instantiated_query, &self.search_results, fields, top_k)
    }

    /// URLs of the results forwarded to the model
    pub fn sources(&self, top_k: usize) -> Vec<String> {
        self.search_results
            .iter()
            .take(top_k)
            .map(|r| r.url.clone())
            .collect()
    }
}

/// Fields extracted for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub row_id: RowId,
    pub entity: String,
    pub query: String,
    /// Requested field to value, in request order
    pub fields: IndexMap<String, String>,
    pub sources: Vec<String>,
}

/// Step of the row pipeline at which a row failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Template,
    Search,
    Llm,
    Parse,
    Internal,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Template => "template",
            FailureStage::Search => "search",
            FailureStage::Llm => "llm",
            FailureStage::Parse => "parse",
            FailureStage::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Failure,
    Skipped,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failed",
            OutcomeKind::Skipped => "skipped",
        }
    }
}

/// Result of processing one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome {
    Success(ExtractionResult),
    Failure {
        row_id: RowId,
        entity: String,
        reason: String,
        stage: FailureStage,
    },
    /// Never started, or abandoned, because the batch was cancelled
    Skipped { row_id: RowId, entity: String },
}

impl RowOutcome {
    pub fn failure(
        row_id: RowId,
        entity: impl Into<String>,
        stage: FailureStage,
        reason: impl fmt::Display,
    ) -> Self {
        RowOutcome::Failure {
            row_id,
            entity: entity.into(),
            reason: reason.to_string(),
            stage,
        }
    }

    pub fn row_id(&self) -> RowId {
        match self {
            RowOutcome::Success(result) => result.row_id,
            RowOutcome::Failure { row_id, .. } | RowOutcome::Skipped { row_id, .. } => *row_id,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            RowOutcome::Success(result) => &result.entity,
            RowOutcome::Failure { entity, .. } | RowOutcome::Skipped { entity, .. } => entity,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            RowOutcome::Success(_) => OutcomeKind::Success,
            RowOutcome::Failure { .. } => OutcomeKind::Failure,
            RowOutcome::Skipped { .. } => OutcomeKind::Skipped,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success(_))
    }

    /// `stage: reason` for failures
    pub fn error_message(&self) -> Option<String> {
        match self {
            RowOutcome::Failure { reason, stage, .. } => Some(format!("{}: {}", stage, reason)),
            _ => None,
        }
    }
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[RowOutcome], cancelled: bool) -> Self {
        let count = |kind| outcomes.iter().filter(|o| o.kind() == kind).count();
        Self {
            total: outcomes.len(),
            succeeded: count(OutcomeKind::Success),
            failed: count(OutcomeKind::Failure),
            skipped: count(OutcomeKind::Skipped),
            cancelled,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} succeeded, {} failed, {} skipped",
            self.total, self.succeeded, self.failed, self.skipped
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Header plus string rows, ready for an exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecords {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// All outcomes of a batch, one per input row in dataset order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    pub batch_id: Uuid,
    pub entity_column: String,
    pub fields: Vec<String>,
    pub outcomes: Vec<RowOutcome>,
    pub summary: BatchSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.kind() == OutcomeKind::Failure)
    }

    pub fn first_failures(&self, n: usize) -> Vec<&RowOutcome> {
        self.failures().take(n).collect()
    }

    /// Flatten to `entity, <fields...>, status, error` records
    pub fn to_records(&self) -> TableRecords {
        let mut header = Vec::with_capacity(self.fields.len() + 3);
        header.push(self.entity_column.clone());
        header.extend(self.fields.iter().cloned());
        header.push("status".to_string());
        header.push("error".to_string());

        let rows = self
            .outcomes
            .iter()
            .map(|outcome| {
                let mut record = Vec::with_capacity(header.len());
                record.push(outcome.entity().to_string());
                for field in &self.fields {
                    let value = match outcome {
                        RowOutcome::Success(result) => {
                            result.fields.get(field).cloned().unwrap_or_default()
                        }
                        _ => String::new(),
                    };
                    record.push(value);
                }
                record.push(outcome.kind().as_str().to_string());
                record.push(outcome.error_message().unwrap_or_default());
                record
            })
            .collect();

        TableRecords { header, rows }
    }
}

/// Sent after every finished row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub row_id: RowId,
    pub kind: OutcomeKind,
}
