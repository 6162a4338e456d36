//! pledge deploys the liquid staking contracts in dependency order, records where they landed,
//! and wires them together.

mod cli;
mod config;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    cli.command.run(&cli.config).await
}
