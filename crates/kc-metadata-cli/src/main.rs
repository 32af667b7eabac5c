//! # kc-metadata
//!
//! Command-line tool for SAML federation metadata.

#![forbid(unsafe_code)]

use clap::Parser;
use kc_metadata_cli::{
    cli::{Cli, Command},
    commands::{run_config, run_inspect, run_resolve, run_watch},
    config::CliConfig,
    output::error,
    CliResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => CliConfig::config_path()?,
    };
    let config = CliConfig::load_from(&config_path)?;
    let format = cli.output.unwrap_or(config.output_format);

    match cli.command {
        Command::Config(cmd) => run_config(cmd, &config, &config_path),
        Command::Resolve(args) => {
            let source = config.effective_source(cli.source.as_deref())?;
            run_resolve(args, &config, &source, &cli.pipeline, format).await
        }
        Command::Inspect { entities } => {
            let source = config.effective_source(cli.source.as_deref())?;
            run_inspect(entities, &config, &source, &cli.pipeline, format).await
        }
        Command::Watch { interval } => {
            let source = config.effective_source(cli.source.as_deref())?;
            run_watch(interval, &config, &source, &cli.pipeline, format).await
        }
    }
}
