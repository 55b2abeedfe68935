use super::LoggingArgs;
use crate::config::Args as SettingsArgs;
use clap::Args;

#[derive(Args)]
pub struct TailCommand {
    /// Stream name, e.g. "sensors/temperature"
    pub stream: String,

    /// Print frames as JSON instead of tables
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}
