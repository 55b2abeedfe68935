use super::LoggingArgs;
use crate::config::Args as SettingsArgs;
use clap::Args;

#[derive(Args)]
pub struct ServeCommand {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}
