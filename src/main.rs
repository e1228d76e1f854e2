//! deploy-tools - compile, deploy and interact with EVM smart contracts
//!
//! Exit codes: 0 on success, 1 if a transaction was mined but failed, 2 for
//! invalid usage and 3 for any other error.

use anyhow::{Context, Result};
use clap::Parser;
use deploy_tools::cli::Cli;
use deploy_tools::config::{LogConfig, Settings};
use deploy_tools::DeployError;
use std::process::ExitCode;
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Usage errors reported by clap exit with code 2 here
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    init_logging(&settings.log);
    debug!("Running deploy-tools v{}", env!("CARGO_PKG_VERSION"));

    cli.run(&settings).await?;
    Ok(())
}

fn exit_code(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<DeployError>() {
        Some(e) if e.is_transaction_failure() => ExitCode::from(1),
        Some(e) if e.is_usage_error() => ExitCode::from(2),
        _ => ExitCode::from(3),
    }
}

fn init_logging(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    // stdout carries command results only
    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
