//! Orcastream binary.
//!
//! Entry point for the orcastream gateway: a live-streaming bridge that polls
//! Arrow Flight streams and forwards new rows to HTTP subscribers.

use clap::Parser;
use orcastream_core::{
    cli::commands::Commands,
    cli::{handle_config, handle_serve, handle_streams, handle_tail, init_logging},
    config::GatewaySettings,
};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.command.logging())?;

    info!("Orcastream starting up");

    match cli.command {
        Commands::Serve(cmd) => handle_serve(GatewaySettings::load(&cmd.settings)?).await?,
        Commands::Streams(cmd) => handle_streams(GatewaySettings::load(&cmd.settings)?).await?,
        Commands::Tail(cmd) => {
            let settings = GatewaySettings::load(&cmd.settings)?;
            handle_tail(settings, &cmd.stream, cmd.json).await?
        }
        Commands::Config(cmd) => handle_config(&GatewaySettings::load(&cmd.settings)?)?,
    }

    Ok(())
}
