// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared limiter across a whole batch

use enrich_agent::{BatchExtractor, EnrichmentConfig, QueryRunner, RateLimit};
use std::sync::Arc;
use std::time::Duration;

use super::stubs::{companies, test_config, ScriptedLlm, ScriptedSearch};

#[tokio::test(start_paused = true)]
async fn test_search_calls_respect_window_across_workers() {
    let config = EnrichmentConfig {
        search_rate: RateLimit::new(2, 1.0),
        ..test_config()
    };
    let search = Arc::new(ScriptedSearch::default());
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &config,
    );

    let start = tokio::time::Instant::now();
    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["A", "B", "C", "D", "E"]),
            "Company",
            "Get the email of {entity}",
            5,
        )
        .await
        .unwrap();

    assert_eq!(table.summary.succeeded, 5);
    assert!(start.elapsed() >= Duration::from_secs(2));

    let times = search.start_times();
    assert_eq!(times.len(), 5);
    for (i, t) in times.iter().enumerate() {
        let in_window = times[i..]
            .iter()
            .filter(|other| other.duration_since(*t) < Duration::from_secs(1))
            .count();
        assert!(in_window <= 2, "more than 2 searches within 1s of call {}", i);
    }
}

#[tokio::test(start_paused = true)]
async fn test_search_cache_skips_limiter_for_repeated_entities() {
    let config = EnrichmentConfig {
        search_rate: RateLimit::new(1, 60.0),
        search_cache_ttl_secs: 3600,
        ..test_config()
    };
    let search = Arc::new(ScriptedSearch::default());
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &config,
    );

    let start = tokio::time::Instant::now();
    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["Acme", "acme", "Acme", "ACME"]),
            "Company",
            "Get the email of {entity}",
            1,
        )
        .await
        .unwrap();

    assert_eq!(table.summary.succeeded, 4);
    assert_eq!(search.calls(), 1);
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_duplicate_entities_share_one_search() {
    let config = EnrichmentConfig {
        search_cache_ttl_secs: 3600,
        ..test_config()
    };
    let search = Arc::new(ScriptedSearch {
        default_delay: Duration::from_millis(200),
        ..Default::default()
    });
    let runner = QueryRunner::with_providers(
        search.clone(),
        Arc::new(ScriptedLlm::replying("email: a@b.com")),
        &config,
    );

    let table = BatchExtractor::new(runner)
        .run(
            &companies(&["Acme", "Acme", "Acme"]),
            "Company",
            "Get the email of {entity}",
            3,
        )
        .await
        .unwrap();

    assert_eq!(table.summary.succeeded, 3);
    assert_eq!(search.calls(), 1);
}
