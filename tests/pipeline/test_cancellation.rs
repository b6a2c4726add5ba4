// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Cancelling a batch part-way through

use enrich_agent::{
    BatchExtractor, InFlightPolicy, OutcomeKind, QueryRunner, RowId, RowOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::stubs::{companies, test_config, ScriptedLlm, ScriptedSearch};

const TEMPLATE: &str = "Get the email of {entity}";

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Company{:02}", i)).collect()
}

#[tokio::test(start_paused = true)]
async fn test_at_most_concurrency_rows_start_after_cancel() {
    let concurrency = 3;
    let names = names(20);
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let cancel = CancellationToken::new();

    // Row 5 cancels the batch as soon as it starts
    let search = Arc::new(ScriptedSearch {
        default_delay: Duration::from_millis(250),
        cancel_on: Some(("Company05".to_string(), cancel.clone())),
        ..Default::default()
    });
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run_with_cancel(&companies(&name_refs), "Company", TEMPLATE, concurrency, cancel)
        .await
        .unwrap();

    let started = search.started_queries();
    let trigger = started.iter().position(|q| q.contains("Company05")).unwrap();
    assert!(started.len() - (trigger + 1) <= concurrency);

    assert_eq!(table.len(), 20);
    assert!(table.summary.cancelled);
    for (i, outcome) in table.outcomes.iter().enumerate() {
        assert_eq!(outcome.row_id(), RowId(i));
    }
    // Every started row completed and kept its position
    let succeeded: Vec<usize> = table
        .outcomes
        .iter()
        .filter(|o| o.is_success())
        .map(|o| o.row_id().index())
        .collect();
    assert_eq!(succeeded.len(), started.len());
    assert!(table.outcomes[0].is_success());
    assert_eq!(table.outcomes[19].kind(), OutcomeKind::Skipped);
    assert_eq!(
        table.summary.succeeded + table.summary.skipped,
        table.summary.total
    );
}

#[tokio::test(start_paused = true)]
async fn test_complete_policy_finishes_in_flight_rows() {
    let cancel = CancellationToken::new();
    let search = Arc::new(ScriptedSearch {
        default_delay: Duration::from_secs(10),
        ..Default::default()
    });
    let runner = QueryRunner::with_providers(
        search,
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &test_config(),
    );

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let table = BatchExtractor::new(runner)
        .with_in_flight(InFlightPolicy::Complete)
        .run_with_cancel(
            &companies(&["A", "B", "C", "D"]),
            "Company",
            TEMPLATE,
            2,
            cancel,
        )
        .await
        .unwrap();

    let kinds: Vec<OutcomeKind> = table.outcomes.iter().map(RowOutcome::kind).collect();
    assert_eq!(
        kinds,
        vec![
            OutcomeKind::Success,
            OutcomeKind::Success,
            OutcomeKind::Skipped,
            OutcomeKind::Skipped
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandon_policy_drops_in_flight_rows() {
    let cancel = CancellationToken::new();
    let search = Arc::new(ScriptedSearch {
        default_delay: Duration::from_secs(10),
        ..Default::default()
    });
    let llm = Arc::new(ScriptedLlm::replying("email: a@b.com"));
    let runner = QueryRunner::with_providers(search.clone(), llm.clone(), &test_config());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let table = BatchExtractor::new(runner)
        .with_in_flight(InFlightPolicy::Abandon)
        .run_with_cancel(
            &companies(&["A", "B", "C", "D"]),
            "Company",
            TEMPLATE,
            2,
            cancel,
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(table.summary.skipped, 4);
    assert_eq!(search.calls(), 2);
    assert_eq!(llm.calls(), 0);
    assert_eq!(table.outcomes[1].entity(), "B");
}
