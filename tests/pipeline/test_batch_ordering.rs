// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Batch output order and field extraction

use enrich_agent::extraction::NOT_FOUND;
use enrich_agent::{BatchExtractor, QueryRunner, RowId, RowOutcome};
use std::sync::Arc;
use std::time::Duration;

use super::stubs::{companies, test_config, ScriptedLlm, ScriptedSearch};

const TEMPLATE: &str = "Get the email and address for {entity}";

#[tokio::test(start_paused = true)]
async fn test_one_outcome_per_row_in_dataset_order() {
    let names = ["Acme", "Globex", "Initech", "Umbrella", "Hooli", "Stark"];
    // Earlier rows are slower, so rows finish in reverse order
    let search = ScriptedSearch {
        delays: names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), Duration::from_millis(600 - 100 * i as u64)))
            .collect(),
        ..Default::default()
    };
    let runner = QueryRunner::with_providers(
        Arc::new(search),
        Arc::new(ScriptedLlm::replying("email: info@{entity}.example")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&names), "Company", TEMPLATE, 3)
        .await
        .unwrap();

    assert_eq!(table.len(), names.len());
    for (i, outcome) in table.outcomes.iter().enumerate() {
        assert_eq!(outcome.row_id(), RowId(i));
        assert_eq!(outcome.entity(), names[i]);
    }
}

#[tokio::test]
async fn test_fixed_reply_fills_every_row() {
    let runner = QueryRunner::with_providers(
        Arc::new(ScriptedSearch::default()),
        Arc::new(ScriptedLlm::replying("email: a@b.com; address: not found")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&["Acme", "Globex", "Initech"]), "Company", TEMPLATE, 2)
        .await
        .unwrap();

    assert_eq!(table.fields, vec!["email", "address"]);
    assert_eq!(table.summary.succeeded, 3);
    for outcome in &table.outcomes {
        let RowOutcome::Success(result) = outcome else {
            panic!("expected success: {:?}", outcome);
        };
        assert_eq!(result.fields["email"], "a@b.com");
        assert_eq!(result.fields["address"], NOT_FOUND);
        assert_eq!(
            result.sources,
            vec!["https://one.example", "https://two.example"]
        );
    }
}

#[tokio::test]
async fn test_records_for_export() {
    let runner = QueryRunner::with_providers(
        Arc::new(ScriptedSearch::default()),
        Arc::new(ScriptedLlm::replying("email: a@b.com\naddress: 1 Main St")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&["Acme"]), "Company", TEMPLATE, 1)
        .await
        .unwrap();
    let records = table.to_records();

    assert_eq!(records.header, vec!["Company", "email", "address", "status", "error"]);
    assert_eq!(records.rows, vec![vec!["Acme", "a@b.com", "1 Main St", "success", ""]]);
}
