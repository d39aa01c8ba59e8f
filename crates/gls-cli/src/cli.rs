//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Write the debug log to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Retention policy for disconnected devices (keep-encrypted, keep-bonded, keep-all, drop-all)
    #[arg(long)]
    pub retention: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Read commands from stdin until QUIT or end of input (default)
    Shell,
    /// Print the effective configuration as TOML
    ShowConfig,
    /// Print an example configuration file
    ExampleConfig,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Shell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_is_default() {
        let cli = Cli::parse_from(["glsctl", "--verbose"]);
        assert!(cli.verbose);
        assert_eq!(cli.command(), Commands::Shell);
    }

    #[test]
    fn test_overrides_parse() {
        let cli = Cli::parse_from([
            "glsctl",
            "--config",
            "gls.toml",
            "--retention",
            "keep-all",
            "show-config",
        ]);
        assert_eq!(cli.config.as_deref(), Some("gls.toml"));
        assert_eq!(cli.retention.as_deref(), Some("keep-all"));
        assert_eq!(cli.command(), Commands::ShowConfig);
    }
}
