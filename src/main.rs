//! Eurostat CLI - fetch, cache and decode Eurostat datasets
//!
//! Prints the result of the requested query as JSON on stdout; logs go to stderr.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eurostat_cli::cli::Cli;
use eurostat_cli::config::Config;
use eurostat_cli::query::QueryContext;

/// Sets up stderr logging, filtered by `RUST_LOG` (default: info for this crate)
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eurostat_cli=info,eurostat=info".into()),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration, then let flags override it
    let config = cli.apply_to(Config::load(cli.config.as_deref())?);

    let context = QueryContext::from_config(&config)?;
    let output = context.run(cli.command.into_query()).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
