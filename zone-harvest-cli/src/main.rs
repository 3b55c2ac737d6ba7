//! `zone-harvest` entry point.
//!
//! Runs the requested checks for every domain concurrently and prints the
//! results as one JSON document. Logs go to stderr so stdout stays parseable.

mod cli;
mod config;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use zone_harvest_toolbox::HarvestService;

use cli::Cli;
use config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // Initialize tracing to stderr; `log` records from the toolbox are bridged in.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::load(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, config);
    let requests = settings.requests(&cli.domains);

    tracing::info!(
        "Running {} check(s) for {} domain(s) via {}",
        requests.len(),
        cli.domains.len(),
        settings.nameserver
    );

    let service = HarvestService::new(settings.options);
    let batch = service.run_batch(&settings.nameserver, &requests).await;

    output::emit(&batch.reports, settings.compact, settings.output.as_deref())?;

    if let Some(failure) = batch.first_failure {
        let domain = failure.domain.as_deref().unwrap_or("<unknown>");
        match failure.check {
            Some(check) => tracing::error!("{check} check of {domain} failed: {}", failure.message),
            None => tracing::error!("Check of {domain} failed: {}", failure.message),
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
