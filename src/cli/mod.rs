// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod dataset_io;
pub mod run;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::template::QueryTemplate;

/// Enrich a spreadsheet of entities with facts found on the web
#[derive(Parser, Debug)]
#[command(name = "enrich-agent")]
#[command(version)]
#[command(about = "Web search + LLM extraction over CSV datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enrich every row of a CSV file
    Run(run::RunArgs),

    /// Show the field names a template asks for
    Fields(FieldsArgs),
}

/// Arguments for the fields command
#[derive(Args, Debug)]
pub struct FieldsArgs {
    /// Query template, e.g. "Get the email and address for {entity}"
    #[arg(long, short)]
    pub template: String,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Fields(args) => show_fields(args),
    }
}

fn show_fields(args: FieldsArgs) -> Result<()> {
    let template = QueryTemplate::parse(&args.template)?;
    println!("Placeholders: {}", template.placeholders().join(", "));
    println!("Fields:");
    for field in template.fields() {
        println!("  - {}", field);
    }
    Ok(())
}
