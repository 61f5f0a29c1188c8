use std::path::PathBuf;

use clap::Parser;
use commands::{Command, Commands, Context};
use config::Config;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod commands;
mod config;

/// Moon Arena tournament settlement.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the config file. Defaults to `$CONFIG_DIR/arena/config.toml`.
    #[arg(long, short, env = "ARENA_CONFIG")]
    config: Option<PathBuf>,
    /// Enable debug logs.
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config_path(&self) -> eyre::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::default_path(),
        }
    }
}

fn init_tracing(verbose: bool) -> eyre::Result<()> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| eyre::eyre!("failed to initialize tracing: {err}"))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config_path = cli.config_path()?;
    let config = Config::load(&config_path)?;
    tracing::debug!(path = %config_path.display(), "loaded config");

    cli.command
        .execute(Context::new(&config_path, &config, cli.verbose))
        .await
}
