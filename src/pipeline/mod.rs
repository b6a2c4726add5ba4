// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Row and batch processing

pub mod batch;
pub mod runner;
pub mod types;

pub use batch::{BatchError, BatchExtractor};
pub use runner::{QueryRunner, DEFAULT_TOP_K};
pub use types::{
    BatchProgress, BatchSummary, Dataset, ExtractionRequest, ExtractionResult, FailureStage,
    OutcomeKind, ResultTable, Row, RowId, RowOutcome, TableRecords,
};
