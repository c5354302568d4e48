//! Ticket entity and its persisted record

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryType, ChannelId, UserId};

/// Schema version written with every record
///
/// Version 1 records predate the field and may lack `createdAt` or
/// `ticketNumber`.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Implicit status of an open ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Unclaimed,
    Claimed,
}

/// An open support ticket, keyed by its backing channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub channel_id: ChannelId,
    pub owner_id: UserId,
    pub claimer_id: Option<UserId>,
    pub category: CategoryType,
    pub ticket_number: u32,
    /// Unknown for records migrated from schema version 1
    pub created_at: Option<DateTime<Utc>>,
    pub custom_name: Option<String>,
}

impl Ticket {
    /// Create a new unclaimed ticket
    pub fn new(
        channel_id: ChannelId,
        owner_id: UserId,
        category: CategoryType,
        ticket_number: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_id,
            owner_id,
            claimer_id: None,
            category,
            ticket_number,
            created_at: Some(created_at),
            custom_name: None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        if self.claimer_id.is_some() {
            TicketStatus::Claimed
        } else {
            TicketStatus::Unclaimed
        }
    }

    /// Human-facing label, e.g. `Report #12`
    #[must_use]
    pub fn display_label(&self) -> String {
        match &self.custom_name {
            Some(name) => format!("{} #{} ({name})", self.category, self.ticket_number),
            None => format!("{} #{}", self.category, self.ticket_number),
        }
    }

    /// Ticket age in whole days at `closed_at`, rounded to nearest
    #[must_use]
    pub fn elapsed_days(&self, closed_at: DateTime<Utc>) -> Option<i64> {
        let created_at = self.created_at?;
        let millis = (closed_at - created_at).num_milliseconds();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let days = (millis as f64 / MILLIS_PER_DAY).round() as i64;
        Some(days)
    }

    /// Convert a persisted record, applying defaults for older schema versions
    pub fn from_record(channel_id: ChannelId, record: TicketRecord) -> Self {
        let created_at = record
            .created_at
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        Self {
            channel_id,
            owner_id: record.owner_id,
            claimer_id: record.claimer_id,
            category: record.category_type,
            ticket_number: record.ticket_number.unwrap_or(0),
            created_at,
            custom_name: record.custom_name,
        }
    }

    /// Persisted form at the current schema version
    #[must_use]
    pub fn to_record(&self) -> TicketRecord {
        TicketRecord {
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            owner_id: self.owner_id.clone(),
            claimer_id: self.claimer_id.clone(),
            created_at: self.created_at.map(|at| at.timestamp_millis()),
            category_type: self.category,
            ticket_number: Some(self.ticket_number),
            custom_name: self.custom_name.clone(),
        }
    }
}

/// A ticket as stored in the shared document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub owner_id: UserId,
    #[serde(default)]
    pub claimer_id: Option<UserId>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    pub category_type: CategoryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl TicketRecord {
    /// Schema version, treating a missing field as version 1
    #[must_use]
    pub fn version(&self) -> u32 {
        self.schema_version.unwrap_or(1)
    }
}
