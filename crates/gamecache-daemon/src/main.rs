//! CacheKeeper daemon - background service for LAN game-cache housekeeping.

mod lifecycle;
mod wiring;

use clap::{Parser, Subcommand};
use gamecache_config::{init_logging, parse_level, Config, Paths};

/// CacheKeeper daemon command-line interface.
#[derive(Parser)]
#[command(name = "cachekeeperd")]
#[command(about = "CacheKeeper daemon for LAN game-cache housekeeping")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(parse_level(&cli.log_level));

    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    match cli.command {
        Some(Commands::Start { foreground }) => {
            wiring::run_daemon(config, paths, foreground).await?;
        }
        None => {
            wiring::run_daemon(config, paths, true).await?;
        }
        Some(Commands::Stop) => {
            lifecycle::stop_daemon(&paths).await?;
        }
        Some(Commands::Status) => {
            lifecycle::check_status(&paths).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_start_with_foreground() {
        let cli = Cli::parse_from(["cachekeeperd", "start", "--foreground"]);
        assert!(matches!(cli.command, Some(Commands::Start { foreground: true })));
    }

    #[test]
    fn parses_stop() {
        let cli = Cli::parse_from(["cachekeeperd", "stop"]);
        assert!(matches!(cli.command, Some(Commands::Stop)));
    }

    #[test]
    fn parses_status() {
        let cli = Cli::parse_from(["cachekeeperd", "status"]);
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn defaults_to_no_subcommand_meaning_foreground_start() {
        let cli = Cli::parse_from(["cachekeeperd"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }
}
