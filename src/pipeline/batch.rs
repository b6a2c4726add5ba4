// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch extraction over a dataset
//!
//! A fixed pool of workers pulls row indices from a shared cursor and writes
//! each outcome into the slot for that index, so the table keeps dataset order
//! whatever order rows finish in. Cancellation stops new rows from starting;
//! rows left without an outcome are reported as skipped.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::runner::QueryRunner;
use super::types::{
    BatchProgress, BatchSummary, Dataset, FailureStage, ResultTable, RowId, RowOutcome,
};
use crate::config::{ConfigError, EnrichmentConfig, InFlightPolicy};
use crate::template::{QueryTemplate, TemplateError};

/// Configuration problems detected before any row is processed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Entity column '{column}' not found (available columns: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Invalid template: {0}")]
    Template(#[from] TemplateError),

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Runs a `QueryRunner` over every row of a dataset
pub struct BatchExtractor {
    runner: QueryRunner,
    in_flight: InFlightPolicy,
    progress: Option<mpsc::UnboundedSender<BatchProgress>>,
}

struct BatchState<'a> {
    dataset: &'a Dataset,
    entity_column: &'a str,
    template: &'a QueryTemplate,
    cancel: &'a CancellationToken,
    cursor: AtomicUsize,
    completed: AtomicUsize,
    slots: Mutex<Vec<Option<RowOutcome>>>,
}

impl BatchExtractor {
    pub fn new(runner: QueryRunner) -> Self {
        Self {
            runner,
            in_flight: InFlightPolicy::default(),
            progress: None,
        }
    }

    /// Build from configuration, including the in-flight policy
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(QueryRunner::from_config(config)?).with_in_flight(config.in_flight))
    }

    /// What happens to rows already running when the batch is cancelled
    pub fn with_in_flight(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    /// Report every finished row on `sender`
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<BatchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    /// Process every row with `concurrency` workers
    pub async fn run(
        &self,
        dataset: &Dataset,
        entity_column: &str,
        template: &str,
        concurrency: usize,
    ) -> Result<ResultTable, BatchError> {
        self.run_with_cancel(
            dataset,
            entity_column,
            template,
            concurrency,
            CancellationToken::new(),
        )
        .await
    }

    /// Like `run`, stopping early when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        dataset: &Dataset,
        entity_column: &str,
        template: &str,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<ResultTable, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::ZeroConcurrency);
        }
        if !dataset.has_column(entity_column) {
            return Err(BatchError::MissingColumn {
                column: entity_column.to_string(),
                available: dataset.columns().to_vec(),
            });
        }
        let template = QueryTemplate::parse(template)?;

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = dataset.len();
        let workers = concurrency.min(total.max(1));

        info!(
            %batch_id,
            rows = total,
            workers,
            fields = ?template.fields(),
            "starting batch extraction"
        );

        let state = BatchState {
            dataset,
            entity_column,
            template: &template,
            cancel: &cancel,
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            slots: Mutex::new((0..total).map(|_| None).collect()),
        };

        futures::future::join_all((0..workers).map(|worker| self.worker(worker, &state))).await;

        let slots = state
            .slots
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let outcomes: Vec<RowOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| RowOutcome::Skipped {
                    row_id: RowId(index),
                    entity: dataset.rows()[index]
                        .get(entity_column)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                })
            })
            .collect();

        let summary = BatchSummary::from_outcomes(&outcomes, cancel.is_cancelled());
        let finished_at = Utc::now();

        info!(
            %batch_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "batch extraction finished"
        );

        Ok(ResultTable {
            batch_id,
            entity_column: entity_column.to_string(),
            fields: template.fields().to_vec(),
            outcomes,
            summary,
            started_at,
            finished_at,
        })
    }

    async fn worker(&self, worker: usize, state: &BatchState<'_>) {
        let total = state.dataset.len();

        loop {
            if state.cancel.is_cancelled() {
                debug!(worker, "batch cancelled, worker stopping");
                break;
            }

            let index = state.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }
            let row_id = RowId(index);
            debug!(worker, row_id = index, "processing row");

            let work = AssertUnwindSafe(self.runner.process(
                row_id,
                &state.dataset.rows()[index],
                state.entity_column,
                state.template,
            ))
            .catch_unwind();

            let result = match self.in_flight {
                InFlightPolicy::Complete => work.await,
                InFlightPolicy::Abandon => tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => {
                        debug!(worker, row_id = index, "abandoning in-flight row");
                        break;
                    }
                    result = work => result,
                },
            };

            let outcome = result.unwrap_or_else(|panic| {
                let reason = format!("row processing panicked: {}", panic_message(&*panic));
                warn!(worker, row_id = index, %reason, "row panicked");
                let entity = state.dataset.rows()[index]
                    .get(state.entity_column)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                RowOutcome::failure(row_id, entity, FailureStage::Internal, reason)
            });
            let kind = outcome.kind();

            {
                let mut slots = state
                    .slots
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                slots[index] = Some(outcome);
            }

            let completed = state.completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &self.progress {
                // A dropped receiver only means nobody is watching
                let _ = progress.send(BatchProgress {
                    completed,
                    total,
                    row_id,
                    kind,
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
