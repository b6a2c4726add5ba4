// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Row-level failures never abort the batch

use enrich_agent::{
    BatchExtractor, Dataset, FailureStage, ProviderError, QueryRunner, Row, RowOutcome,
};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::stubs::{companies, test_config, ScriptedLlm, ScriptedSearch};

fn stage_of(outcome: &RowOutcome) -> Option<FailureStage> {
    match outcome {
        RowOutcome::Failure { stage, .. } => Some(*stage),
        _ => None,
    }
}

#[tokio::test]
async fn test_permanent_search_failure_never_calls_llm() {
    let search = Arc::new(ScriptedSearch {
        failure: Some(ProviderError::Unauthorized {
            provider: "scripted".to_string(),
        }),
        ..Default::default()
    });
    let llm = Arc::new(ScriptedLlm::replying("email: a@b.com"));
    let runner = QueryRunner::with_providers(search.clone(), llm.clone(), &test_config());

    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["Acme", "Globex", "Initech"]),
            "Company",
            "Get the email of {entity}",
            2,
        )
        .await
        .unwrap();

    assert!(table
        .outcomes
        .iter()
        .all(|o| stage_of(o) == Some(FailureStage::Search)));
    assert_eq!(llm.calls(), 0);
    // 401 is permanent: one attempt per row
    assert_eq!(search.calls(), 3);
    assert_eq!(table.summary.failed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_search_failures_retried() {
    let search = Arc::new(ScriptedSearch {
        transient_failures: AtomicUsize::new(2),
        ..Default::default()
    });
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&["Acme"]), "Company", "Get the email of {entity}", 1)
        .await
        .unwrap();

    assert!(table.outcomes[0].is_success());
    assert_eq!(search.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_bounded_by_max_attempts() {
    let search = Arc::new(ScriptedSearch {
        transient_failures: AtomicUsize::new(10),
        ..Default::default()
    });
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&["Acme"]), "Company", "Get the email of {entity}", 1)
        .await
        .unwrap();

    assert_eq!(stage_of(&table.outcomes[0]), Some(FailureStage::Search));
    assert_eq!(search.calls(), 3);
}

#[tokio::test]
async fn test_llm_failure_is_row_scoped() {
    let runner = QueryRunner::with_providers(
        Arc::new(ScriptedSearch::default()),
        Arc::new(ScriptedLlm::failing(ProviderError::Malformed {
            provider: "scripted".to_string(),
            message: "no choices".to_string(),
        })),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&companies(&["Acme", "Globex"]), "Company", "Get the email of {entity}", 2)
        .await
        .unwrap();

    assert!(table
        .outcomes
        .iter()
        .all(|o| stage_of(o) == Some(FailureStage::Llm)));
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn test_template_failures_per_row() {
    let mut dataset = Dataset::new(vec!["Company".to_string(), "City".to_string()]);
    dataset.push(Row::from_pairs(vec![
        ("Company".to_string(), "Acme".to_string()),
        ("City".to_string(), "Berlin".to_string()),
    ]));
    dataset.push(Row::from_pairs(vec![
        ("Company".to_string(), "".to_string()),
        ("City".to_string(), "Paris".to_string()),
    ]));
    dataset.push(Row::from_pairs(vec![
        ("Company".to_string(), "Globex".to_string()),
        ("City".to_string(), " ".to_string()),
    ]));

    let search = Arc::new(ScriptedSearch::default());
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(&dataset, "Company", "Get the email of {entity} in {city}", 2)
        .await
        .unwrap();

    assert!(table.outcomes[0].is_success());
    assert_eq!(stage_of(&table.outcomes[1]), Some(FailureStage::Template));
    assert_eq!(stage_of(&table.outcomes[2]), Some(FailureStage::Template));
    assert_eq!(search.calls(), 1);
}

#[tokio::test]
async fn test_unparseable_reply_fails_at_parse_stage() {
    let runner = QueryRunner::with_providers(
        Arc::new(ScriptedSearch::default()),
        Arc::new(ScriptedLlm::replying("I could not find anything useful.")),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["Acme"]),
            "Company",
            "Get the email and address for {entity}",
            1,
        )
        .await
        .unwrap();

    assert_eq!(stage_of(&table.outcomes[0]), Some(FailureStage::Parse));
    assert!(table.to_records().rows[0][4].starts_with("parse: "));
}

#[tokio::test]
async fn test_single_field_refusal_fails_at_parse_stage() {
    let llm = Arc::new(ScriptedLlm::replying(
        "I'm sorry, I could not find that information.",
    ));
    let runner = QueryRunner::with_providers(
        Arc::new(ScriptedSearch::default()),
        llm.clone(),
        &test_config(),
    );

    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["Acme"]),
            "Company",
            "Get the email address of {entity}",
            1,
        )
        .await
        .unwrap();

    assert_eq!(llm.calls(), 1);
    assert_eq!(stage_of(&table.outcomes[0]), Some(FailureStage::Parse));
    assert_eq!(table.summary.failed, 1);
}
