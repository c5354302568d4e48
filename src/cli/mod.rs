//! Command-line interface for ticket-desk
//!
//! The bot itself runs behind a platform gateway; the CLI covers the
//! operator side: checking configuration, inspecting the ticket document,
//! rendering transcripts and replaying scripted sessions against the
//! in-memory platform.

pub mod handlers;
mod output;

pub use output::OutputFormatter;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Support-ticket desk for chat community servers
#[derive(Parser, Debug)]
#[command(name = "ticket-desk", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, global = true, env = "DESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Inspect the shared ticket document
    Tickets {
        #[command(subcommand)]
        command: TicketCommands,
    },

    /// Work with ticket transcripts
    Transcript {
        #[command(subcommand)]
        command: TranscriptCommands,
    },

    /// Replay a scripted session against an in-memory server
    Simulate {
        /// YAML script with members and inbound actions
        script: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate the configuration
    Check,

    /// Print the resolved configuration with secrets masked
    Show,

    /// Print the default configuration file location
    Path,
}

#[derive(Subcommand, Debug)]
pub enum TicketCommands {
    /// List open tickets
    List {
        /// Only tickets of this category (report, appeal, inquiry)
        #[arg(long)]
        category: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// Show one ticket by channel id
    Show {
        channel: String,
    },

    /// Print the number the next ticket of a category would get
    NextNumber {
        category: String,
    },

    /// Report tickets whose channel no longer exists
    Reconcile {
        /// Channel ids that currently exist, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        live: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TranscriptCommands {
    /// Render a transcript page from exported channel messages
    Render {
        /// JSON array of channel messages, oldest first
        messages: PathBuf,

        /// Channel name shown in the page title
        #[arg(long, default_value = "ticket")]
        name: String,

        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Publish under this channel id with the configured publisher
        #[arg(long, conflicts_with = "output")]
        publish: Option<String>,
    },
}

/// Output format for `tickets list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reconcile_list() {
        let cli = Cli::parse_from(["ticket-desk", "tickets", "reconcile", "--live", "1,2,3"]);
        match cli.command {
            Commands::Tickets {
                command: TicketCommands::Reconcile { live },
            } => assert_eq!(live, vec!["1", "2", "3"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ticket-desk", "config", "check", "--json", "--no-color"]);
        assert!(cli.json);
        assert!(cli.no_color);
    }
}
