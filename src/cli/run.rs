// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::dataset_io::{read_dataset, write_table};
use crate::config::{env_lookup, EnrichmentConfig, InFlightPolicy, SearchProviderKind};
use crate::pipeline::{BatchExtractor, BatchProgress, OutcomeKind, ResultTable};

/// Failure reasons printed after a run
const FAILURES_SHOWN: usize = 3;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// CSV file with one entity per row
    #[arg(long, short)]
    pub input: PathBuf,

    /// Column holding the entity names
    #[arg(long, short)]
    pub column: String,

    /// Query template, e.g. "Get the email address of {entity}"
    #[arg(long, short)]
    pub template: String,

    /// Where to write the results
    #[arg(long, short, default_value = "extracted_data.csv")]
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "ENRICH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rows processed in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Search results forwarded to the model per row
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Search provider (serpapi or brave)
    #[arg(long)]
    pub provider: Option<String>,

    /// Drop in-flight rows on Ctrl-C instead of letting them finish
    #[arg(long)]
    pub abandon_in_flight: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Build the effective configuration: file, then environment, then flags
///
/// `lookup` resolves environment variables by name.
pub fn resolve_config<F>(args: &RunArgs, lookup: F) -> Result<EnrichmentConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => EnrichmentConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EnrichmentConfig::default(),
    };
    config.apply_overrides(&lookup)?;

    if let Some(provider) = &args.provider {
        let provider: SearchProviderKind = provider.parse()?;
        config.set_search_provider(provider, &lookup);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(top_k) = args.top_k {
        config.top_k_results = top_k;
    }
    if args.abandon_in_flight {
        config.in_flight = InFlightPolicy::Abandon;
    }

    config.validate()?;
    Ok(config)
}

/// Enrich every row of the input file and write the results
pub async fn run(args: RunArgs) -> Result<()> {
    dotenv::dotenv().ok();

    let config = resolve_config(&args, env_lookup)?;
    let dataset = read_dataset(&args.input)?;
    println!("📄 Loaded {} rows from {}", dataset.len(), args.input.display());

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let extractor = BatchExtractor::from_config(&config)
        .context("Failed to set up search and LLM providers")?
        .with_progress(progress_tx);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        let notice = interrupt_notice(config.in_flight);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("{}", notice);
                cancel.cancel();
            }
        })
    };

    let progress = if args.no_progress {
        drop(progress_rx);
        None
    } else {
        Some(tokio::spawn(render_progress(dataset.len(), progress_rx)))
    };

    let result = extractor
        .run_with_cancel(
            &dataset,
            &args.column,
            &args.template,
            config.concurrency,
            cancel,
        )
        .await;

    ctrl_c.abort();
    // Closes the progress channel
    drop(extractor);
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    let table = result?;
    write_table(&args.output, &table)?;
    info!(output = %args.output.display(), rows = table.len(), "results written");

    print_summary(&table);
    println!("💾 Results saved to {}", args.output.display());

    if table.summary.total > 0 && table.summary.succeeded == 0 {
        return Err(anyhow!("No row could be enriched"));
    }
    Ok(())
}

fn interrupt_notice(in_flight: InFlightPolicy) -> &'static str {
    match in_flight {
        InFlightPolicy::Complete => "Interrupt received, stopping after in-flight rows",
        InFlightPolicy::Abandon => "Interrupt received, abandoning in-flight rows",
    }
}

async fn render_progress(total: usize, mut events: mpsc::UnboundedReceiver<BatchProgress>) {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut failed = 0usize;
    while let Some(event) = events.recv().await {
        if event.kind == OutcomeKind::Failure {
            failed += 1;
        }
        bar.set_position(event.completed as u64);
        bar.set_message(format!("{} failed", failed));
    }
    bar.finish_and_clear();
}

/// Human-readable summary lines for a finished batch
pub fn summary_lines(table: &ResultTable) -> Vec<String> {
    let mut lines = vec![format!("✅ {}", table.summary)];

    let failures = table.first_failures(FAILURES_SHOWN);
    if !failures.is_empty() {
        lines.push("❌ First failures:".to_string());
        for failure in failures {
            lines.push(format!(
                "   row {} ({}): {}",
                failure.row_id(),
                failure.entity(),
                failure.error_message().unwrap_or_default()
            ));
        }
    }
    if table.summary.cancelled {
        lines.push("⚠️  Run was cancelled; unfinished rows are marked skipped".to_string());
    }
    lines
}

fn print_summary(table: &ResultTable) {
    println!();
    for line in summary_lines(table) {
        println!("{}", line);
    }
}
