//! Handlers for the `tickets` commands
//!
//! Read-only views over the shared ticket document. Nothing here writes to
//! the store; reconciliation only reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::cli::{ListFormat, OutputFormatter};
use crate::config::DeskConfig;
use crate::core::{CategoryType, ChannelId, Ticket, TicketStatus};
use crate::error::{Precondition, Result};
use crate::lifecycle::SequenceAllocator;
use crate::storage::{TicketDocument, TicketLedger};

/// One ticket as printed by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRow {
    pub channel_id: String,
    pub category: CategoryType,
    pub number: u32,
    pub owner_id: String,
    pub claimer_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
}

impl From<&Ticket> for TicketRow {
    fn from(ticket: &Ticket) -> Self {
        Self {
            channel_id: ticket.channel_id.to_string(),
            category: ticket.category,
            number: ticket.ticket_number,
            owner_id: ticket.owner_id.to_string(),
            claimer_id: ticket.claimer_id.as_ref().map(ToString::to_string),
            created_at: ticket.created_at,
            name: ticket.custom_name.clone(),
        }
    }
}

async fn load_document(config_path: Option<&Path>, context: &str) -> Result<TicketDocument> {
    let config = DeskConfig::load(config_path)?;
    let ledger = TicketLedger::new(config.build_store()?, config.store.max_attempts);
    Ok(ledger.snapshot(context).await?.document)
}

fn sorted_rows<'a>(tickets: impl Iterator<Item = &'a Ticket>) -> Vec<TicketRow> {
    let mut rows: Vec<TicketRow> = tickets.map(TicketRow::from).collect();
    rows.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then(a.number.cmp(&b.number))
            .then_with(|| a.channel_id.cmp(&b.channel_id))
    });
    rows
}

/// List open tickets, optionally filtered by category
///
/// # Arguments
///
/// * `category` - Only list tickets of this category
/// * `format` - Table, JSON or CSV; `--json` forces JSON
/// * `config_path` - Optional configuration file
/// * `output` - Output formatter for displaying results
pub async fn handle_tickets_list(
    category: Option<&str>,
    format: ListFormat,
    config_path: Option<&Path>,
    output: &OutputFormatter,
) -> Result<()> {
    let category = category.map(str::parse::<CategoryType>).transpose()?;
    let document = load_document(config_path, "listing tickets").await?;
    let rows = sorted_rows(
        document
            .tickets()
            .filter(|ticket| category.is_none_or(|c| ticket.category == c)),
    );

    let format = if output.is_json() { ListFormat::Json } else { format };
    match format {
        ListFormat::Json => output.json(&rows),
        ListFormat::Csv => write_csv(&rows),
        ListFormat::Table => {
            print_table(&rows, output);
            Ok(())
        },
    }
}

fn write_csv(rows: &[TicketRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record([
        "channel_id",
        "category",
        "number",
        "owner_id",
        "claimer_id",
        "created_at",
        "name",
    ])?;
    for row in rows {
        writer.write_record([
            row.channel_id.clone(),
            row.category.to_string(),
            row.number.to_string(),
            row.owner_id.clone(),
            row.claimer_id.clone().unwrap_or_default(),
            row.created_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            row.name.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_table(rows: &[TicketRow], output: &OutputFormatter) {
    if rows.is_empty() {
        output.info("No open tickets");
        return;
    }
    output.heading(&format!(
        "{:<20} {:<8} {:>5}  {:<20} {:<20} {}",
        "CHANNEL", "CATEGORY", "#", "OWNER", "CLAIMED BY", "CREATED"
    ));
    for row in rows {
        output.info(&format!(
            "{:<20} {:<8} {:>5}  {:<20} {:<20} {}",
            row.channel_id,
            row.category,
            row.number,
            row.owner_id,
            row.claimer_id.as_deref().unwrap_or("-"),
            row.created_at
                .map_or_else(|| "unknown".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string()),
        ));
    }
    output.info(&format!("\n{} ticket(s)", rows.len()));
}

/// Show a single ticket
///
/// # Errors
///
/// Returns [`Precondition::NotATicket`] when the channel has no record.
pub async fn handle_tickets_show(
    channel: &str,
    config_path: Option<&Path>,
    output: &OutputFormatter,
) -> Result<()> {
    let document = load_document(config_path, "showing a ticket").await?;
    let ticket = document
        .get(&ChannelId::new(channel))
        .ok_or_else(|| Precondition::NotATicket {
            channel: channel.to_string(),
        })?;

    if output.is_json() {
        return output.print_json(&TicketRow::from(ticket));
    }

    output.heading(&ticket.display_label());
    output.field("Channel", ticket.channel_id.as_str());
    output.field("Owner", ticket.owner_id.as_str());
    let status = match ticket.status() {
        TicketStatus::Unclaimed => "unclaimed".to_string(),
        TicketStatus::Claimed => format!(
            "claimed by {}",
            ticket.claimer_id.as_ref().map_or("", |c| c.as_str())
        ),
    };
    output.field("Status", &status);
    if let Some(created_at) = ticket.created_at {
        output.field("Created", &created_at.to_rfc3339());
        if let Some(days) = ticket.elapsed_days(Utc::now()) {
            output.field("Open for", &format!("{days} day(s)"));
        }
    }
    Ok(())
}

/// Print the number the next ticket of `category` would receive
pub async fn handle_tickets_next_number(
    category: &str,
    config_path: Option<&Path>,
    output: &OutputFormatter,
) -> Result<()> {
    let category: CategoryType = category.parse()?;
    let document = load_document(config_path, "computing the next ticket number").await?;
    let next = SequenceAllocator::from_document(&document).peek(category);

    if output.is_json() {
        return output.print_json(&serde_json::json!({
            "category": category,
            "next_number": next,
        }));
    }
    output.info(&format!("{category} #{next}"));
    Ok(())
}

/// Report tickets whose channel is not in `live`
///
/// Report only; records are left in place for an operator to review.
pub async fn handle_tickets_reconcile(
    live: &[String],
    config_path: Option<&Path>,
    output: &OutputFormatter,
) -> Result<()> {
    let live: Vec<ChannelId> = live
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(ChannelId::new)
        .collect();
    let document = load_document(config_path, "reconciling tickets").await?;
    let orphans = sorted_rows(document.orphans(&live));

    if output.is_json() {
        return output.print_json(&serde_json::json!({
            "checked": document.len(),
            "orphans": orphans,
        }));
    }
    if orphans.is_empty() {
        output.success(&format!("All {} ticket(s) have a live channel", document.len()));
        return Ok(());
    }
    for row in &orphans {
        output.warning(&format!(
            "{} #{} (owner {}) has no live channel {}",
            row.category, row.number, row.owner_id, row.channel_id
        ));
    }
    output.info(&format!("{} orphaned ticket(s)", orphans.len()));
    Ok(())
}
