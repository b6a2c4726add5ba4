// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// CSV files in and out of a full batch

use async_trait::async_trait;
use enrich_agent::cli::dataset_io::{read_dataset, write_table};
use enrich_agent::extraction::LlmProvider;
use enrich_agent::search::{SearchProvider, SearchResult};
use enrich_agent::{BatchExtractor, EnrichmentConfig, ProviderError, QueryRunner};
use std::io::Write;
use std::sync::Arc;

struct OneResult;

#[async_trait]
impl SearchProvider for OneResult {
    async fn search(&self, query: &str, _n: usize) -> Result<Vec<SearchResult>, ProviderError> {
        Ok(vec![SearchResult::new("https://example.com", query)])
    }

    fn name(&self) -> &'static str {
        "one"
    }
}

struct ContactLlm;

#[async_trait]
impl LlmProvider for ContactLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        Ok("- **Email**: hello@example.com\n- **Phone**: unknown".to_string())
    }

    fn name(&self) -> &'static str {
        "contact"
    }

    fn model(&self) -> &str {
        "contact"
    }
}

#[tokio::test]
async fn test_csv_in_enriched_csv_out() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("companies.csv");
    let output = dir.path().join("extracted_data.csv");

    let mut file = std::fs::File::create(&input).unwrap();
    writeln!(file, "Company,Country").unwrap();
    writeln!(file, "Acme,DE").unwrap();
    writeln!(file, ",FR").unwrap();
    drop(file);

    let dataset = read_dataset(&input).unwrap();
    let runner = QueryRunner::with_providers(
        Arc::new(OneResult),
        Arc::new(ContactLlm),
        &EnrichmentConfig::default(),
    );
    let table = BatchExtractor::new(runner)
        .run(&dataset, "Company", "Find the email & phone of {entity}", 2)
        .await
        .unwrap();
    write_table(&output, &table).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "Company,email,phone,status,error");
    assert_eq!(lines[1], "Acme,hello@example.com,not found,success,");
    assert!(lines[2].starts_with(",,,failed,template: "));
}

#[test]
fn test_missing_input_file() {
    let err = read_dataset(std::path::Path::new("/nonexistent/input.csv")).unwrap_err();
    assert!(err.to_string().contains("Failed to open input file"));
}
