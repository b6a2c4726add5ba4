// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CSV import and export for the command-line front-end

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;

use crate::pipeline::{Dataset, ResultTable};

/// Read a CSV file with a header row
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    read_dataset_from(file).with_context(|| format!("Failed to read CSV from {}", path.display()))
}

/// Read CSV data with a header row from any reader
///
/// Header names are trimmed; rows with fewer cells than the header are padded.
pub fn read_dataset_from<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()
        .context("Missing CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(Dataset::from_records(columns, records))
}

/// Write the result table as CSV
pub fn write_table(path: &Path, table: &ResultTable) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    write_table_to(file, table)
}

pub fn write_table_to<W: Write>(writer: W, table: &ResultTable) -> Result<()> {
    let records = table.to_records();
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&records.header)?;
    for row in &records.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
