//! Findoc CLI Binary
//!
//! Command-line interface for multi-agent financial document generation.

use anyhow::Context;
use clap::Parser;
use findoc::logging::init_logging;
use findoc::tooling::cli::{load_config, Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli).context("Failed to load configuration")?;
    init_logging(Some(&config.logging)).context("Failed to initialize logging")?;

    let context = CliContext::new(config, cli.format).context("Failed to initialize services")?;
    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
