//! glsctl - Glucose Service profile shell

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use gls_cli::{app, cli::Cli, cli::Commands, config::CliAppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = load_configuration(&cli)?
        .with_retention(cli.retention.as_deref())
        .context("invalid command line override")?;

    match cli.command() {
        Commands::Shell => {
            let stats = app::run(config).await?;
            info!(
                commands = stats.commands_processed,
                failed = stats.commands_failed,
                events = stats.events_processed,
                "GLS shell exited"
            );
        }
        Commands::ShowConfig => println!("{}", config.to_toml()?),
        Commands::ExampleConfig => println!("{}", CliAppConfig::example_config()),
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> anyhow::Result<CliAppConfig> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            CliAppConfig::load_from_file(path)
        }
        None => CliAppConfig::load(),
    };
    config.context("failed to load configuration")
}
