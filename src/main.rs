use clap::Parser;
use meshclip_lib::bootstrap::{resolve_config, run_app, tracing::init_tracing_subscriber};
use meshclip_lib::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let config = resolve_config(&cli)?;
    tracing::info!(mode = ?cli.mode(), "Starting meshclip");

    run_app(cli, config).await
}
