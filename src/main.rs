mod cli;
mod config;
mod migrate;
mod model;
mod providers;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log
    let level = if cli.verbose { "debug" } else { cli.log.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Import(args) => cli::run_import(&cli, args, &config).await,
        Commands::CleanupComments(args) => cli::run_cleanup(&cli, args, &config).await,
    }
}
