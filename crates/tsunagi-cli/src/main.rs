use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tsunagi_cli::constants::DEFAULT_LOG_FILTER;
use tsunagi_cli::{Cli, Config, Session, execute};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref()).context("failed to load config")?;

    let mut session = Session::new(&config).context("failed to build session")?;
    session
        .start()
        .await
        .with_context(|| format!("failed to connect to {}", config.connection.url))?;

    let mut stdout = std::io::stdout().lock();
    let result = execute(&session, cli.command, &mut stdout).await;
    session.shutdown();
    result
}
