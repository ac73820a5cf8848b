//! tokenward entry point

#![warn(clippy::all)]

use clap::Parser;
use tokenward_server::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();

    let service = tokenward_server::build_service(&cli)?;
    tokenward_server::serve(&cli, service, tokenward_server::shutdown_signal()).await?;
    Ok(())
}
