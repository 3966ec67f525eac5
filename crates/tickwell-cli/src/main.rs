mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use std::process::ExitCode;
use tickwell_core::{AppConfig, FailurePolicy};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env()?;
    if let Command::Scrape(args) = &cli.command {
        if args.fail_fast {
            config.failure_policy = FailurePolicy::FailFast;
        }
    }

    let result = commands::run(&cli, config).await?;
    if let Some(data) = &result.data {
        output::render(data, cli.pretty)?;
    }

    if result.partial_failure {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
