use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("formstack=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;

    match &cli.command {
        Commands::Check(args) => commands::check::run(args, &config, cli.format),
        Commands::Replay(args) => commands::replay::run(args, config, cli.format).await,
    }
}
