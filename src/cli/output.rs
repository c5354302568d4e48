//! Terminal and JSON output for CLI commands

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;

/// Formats command results for humans or machines
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    json: bool,
    no_color: bool,
}

impl OutputFormatter {
    pub fn new(json: bool, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { json, no_color }
    }

    pub const fn is_json(&self) -> bool {
        self.json
    }

    pub const fn is_colored(&self) -> bool {
        !self.no_color
    }

    pub fn success(&self, message: &str) {
        if !self.json {
            println!("{} {message}", "✓".green());
        }
    }

    pub fn info(&self, message: &str) {
        if !self.json {
            println!("{message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.json {
            eprintln!("{} {message}", "warning:".yellow().bold());
        }
    }

    /// Errors go to stderr in both modes
    pub fn error(&self, message: &str) {
        eprintln!("{} {message}", "error:".red().bold());
    }

    /// Print a value as pretty JSON regardless of mode
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print a value as JSON, only in JSON mode
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            self.json(value)?;
        }
        Ok(())
    }

    /// Bold heading line
    pub fn heading(&self, message: &str) {
        if !self.json {
            println!("{}", message.bold());
        }
    }

    /// Two-column `label: value` line, label dimmed
    pub fn field(&self, label: &str, value: &str) {
        if !self.json {
            println!("  {} {value}", format!("{label}:").dimmed());
        }
    }
}
