pub mod serve;
pub mod tail;

pub use serve::ServeCommand;
pub use tail::TailCommand;

use crate::config::Args as SettingsArgs;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway in front of a Flight server
    Serve(ServeCommand),
    /// List the streams the Flight server offers
    Streams(StreamsCommand),
    /// Follow one stream and print each frame as a table
    Tail(TailCommand),
    /// Print the effective configuration
    Config(ConfigCommand),
}

impl Commands {
    pub fn logging(&self) -> &LoggingArgs {
        match self {
            Commands::Serve(cmd) => &cmd.logging,
            Commands::Streams(cmd) => &cmd.logging,
            Commands::Tail(cmd) => &cmd.logging,
            Commands::Config(cmd) => &cmd.logging,
        }
    }
}

#[derive(Args)]
pub struct StreamsCommand {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args, Debug, Default)]
pub struct LoggingArgs {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log filter directives, e.g. "orcastream_core=debug,tonic=info"
    #[arg(long, env = "ORCASTREAM_LOG_FILTER")]
    pub log_filter: Option<String>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn get_effective_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_parse_tail_with_overrides() {
        let cli = TestCli::try_parse_from([
            "orcastream",
            "tail",
            "sensors/temperature",
            "--server-url",
            "10.0.0.5:50051",
            "--retry-interval-ms",
            "250",
            "-vv",
        ])
        .unwrap();

        match cli.command {
            Commands::Tail(cmd) => {
                assert_eq!(cmd.stream, "sensors/temperature");
                assert_eq!(cmd.settings.server_url.as_deref(), Some("10.0.0.5:50051"));
                assert_eq!(cmd.settings.retry_interval_ms, Some(250));
                assert_eq!(cmd.logging.get_effective_level(), Level::TRACE);
            }
            _ => panic!("expected tail command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = TestCli::try_parse_from(["orcastream", "serve"]).unwrap();
        let logging = cli.command.logging();
        assert_eq!(logging.get_effective_level(), Level::INFO);
        assert!(logging.log_dir.is_none());
    }
}
