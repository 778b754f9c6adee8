use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wirecall::cli::{self, Cli};
use wirecall::client::{Setup, WireClient};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("wirecall: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> wirecall::Result<()> {
    let (target, config) = cli.into_invocation().await?;
    cli::validate(&config)?;

    tracing::debug!(target = %target, variant = ?config.interaction, "connecting");
    let client = WireClient::connect(&target, Setup::default()).await?;

    config.interaction.execute(&client, &config).await
}
