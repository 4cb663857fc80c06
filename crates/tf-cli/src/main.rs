//! tenantflow CLI - inspect tenant configs, pipeline graphs and run jobs locally

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod context;

use cli::{Cli, Commands};
use commands::{graph, run, tenants, validate};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match &cli.command {
        Commands::Tenants(args) => tenants::execute(args, &cli.global).await,
        Commands::Graph(args) => graph::execute(args, &cli.global).await,
        Commands::Validate(args) => validate::execute(args, &cli.global).await,
        Commands::Run(args) => run::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<commands::common::ExitStatus>() {
            Some(status) => ExitCode::from(status.0),
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}
