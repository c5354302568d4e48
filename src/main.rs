//! ticket-desk - Support-ticket desk operator CLI
//!
//! Parses command-line arguments and dispatches to the command handlers.

use clap::Parser;
use std::path::Path;
use std::process;
use ticket_desk::cli::{
    Cli, Commands, ConfigCommands, OutputFormatter, TicketCommands, TranscriptCommands,
};
use ticket_desk::error::{DeskError, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configure output formatter based on flags
    let formatter = OutputFormatter::new(cli.json, cli.no_color);

    if let Err(e) = run(cli, &formatter).await {
        handle_error(&e, &formatter);
        process::exit(1);
    }
}

/// Run the CLI application with the parsed arguments
///
/// # Errors
///
/// Returns any error that occurs during command execution
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Config { command } => dispatch_config_command(command, config, formatter),
        Commands::Tickets { command } => {
            dispatch_ticket_command(command, config, formatter).await
        },
        Commands::Transcript { command } => {
            dispatch_transcript_command(command, config, formatter).await
        },
        Commands::Simulate { script } => {
            use ticket_desk::cli::handlers::handle_simulate;
            handle_simulate(&script, formatter).await
        },
    }
}

fn dispatch_config_command(
    command: ConfigCommands,
    config: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    match command {
        ConfigCommands::Check => {
            use ticket_desk::cli::handlers::handle_config_check;
            handle_config_check(config, formatter)
        },
        ConfigCommands::Show => {
            use ticket_desk::cli::handlers::handle_config_show;
            handle_config_show(config, formatter)
        },
        ConfigCommands::Path => {
            use ticket_desk::cli::handlers::handle_config_path;
            handle_config_path(formatter)
        },
    }
}

async fn dispatch_ticket_command(
    command: TicketCommands,
    config: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    match command {
        TicketCommands::List { category, format } => {
            use ticket_desk::cli::handlers::handle_tickets_list;
            handle_tickets_list(category.as_deref(), format, config, formatter).await
        },
        TicketCommands::Show { channel } => {
            use ticket_desk::cli::handlers::handle_tickets_show;
            handle_tickets_show(&channel, config, formatter).await
        },
        TicketCommands::NextNumber { category } => {
            use ticket_desk::cli::handlers::handle_tickets_next_number;
            handle_tickets_next_number(&category, config, formatter).await
        },
        TicketCommands::Reconcile { live } => {
            use ticket_desk::cli::handlers::handle_tickets_reconcile;
            handle_tickets_reconcile(&live, config, formatter).await
        },
    }
}

async fn dispatch_transcript_command(
    command: TranscriptCommands,
    config: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    match command {
        TranscriptCommands::Render {
            messages,
            name,
            output,
            publish,
        } => {
            use ticket_desk::cli::handlers::handle_transcript_render;
            handle_transcript_render(
                &messages,
                &name,
                output.as_deref(),
                publish.as_deref(),
                config,
                formatter,
            )
            .await
        },
    }
}

fn handle_error(error: &DeskError, formatter: &OutputFormatter) {
    // Display the main error message
    formatter.error(&error_message(error));

    // Display suggestions if available
    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        formatter.info("\nSuggestions:");
        for suggestion in &suggestions {
            formatter.info(&format!("  • {suggestion}"));
        }
    }

    // In JSON mode, output error as JSON
    if formatter.is_json() {
        let _ = formatter.json(&serde_json::json!({
            "status": "error",
            "error": error.to_string(),
            "error_type": format!("{error:?}"),
            "suggestions": suggestions,
            "recoverable": error.is_recoverable(),
            "is_config_error": error.is_config_error(),
        }));
    }

    // In verbose mode, show the full error chain
    if tracing::enabled!(tracing::Level::DEBUG) {
        eprintln!("\nDebug information:");
        eprintln!("{error:?}");
    }
}

/// Operators see the full message; chat users only ever see `user_message`
fn error_message(error: &DeskError) -> String {
    if error.is_rejection() {
        error.user_message()
    } else {
        error.to_string()
    }
}
