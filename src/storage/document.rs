//! In-memory view of the shared ticket document
//!
//! The document is a single JSON object keyed by channel id. Entries that do
//! not parse as a known record version are kept verbatim so that writing the
//! document back never drops data this process does not understand.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::core::{CURRENT_SCHEMA_VERSION, CategoryType, ChannelId, Ticket, TicketRecord, UserId};
use crate::error::{DeskError, Result};

/// Fingerprint of a document's content, used for optimistic concurrency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Revision(u64);

impl Revision {
    /// Fingerprint a JSON document
    #[must_use]
    pub fn of(value: &Value) -> Self {
        let mut hasher = DefaultHasher::new();
        value.to_string().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// The whole ticket document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketDocument {
    tickets: BTreeMap<ChannelId, Ticket>,
    preserved: BTreeMap<String, Value>,
}

impl TicketDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw document, migrating older record versions
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(DeskError::store(
                "parsing the ticket document",
                "document is not a JSON object",
            ));
        };

        let mut document = Self::default();
        for (key, raw) in entries {
            match serde_json::from_value::<TicketRecord>(raw.clone()) {
                Ok(record) if record.version() <= CURRENT_SCHEMA_VERSION => {
                    let channel_id = ChannelId::new(key);
                    document
                        .tickets
                        .insert(channel_id.clone(), Ticket::from_record(channel_id, record));
                },
                Ok(record) => {
                    tracing::warn!(
                        channel = %key,
                        version = record.version(),
                        "Ticket record has a newer schema version; leaving it untouched"
                    );
                    document.preserved.insert(key, raw);
                },
                Err(e) => {
                    tracing::warn!(channel = %key, error = %e, "Unrecognized ticket record preserved as-is");
                    document.preserved.insert(key, raw);
                },
            }
        }
        Ok(document)
    }

    /// Serialize back to the persisted layout
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut entries = Map::new();
        for (key, raw) in &self.preserved {
            entries.insert(key.clone(), raw.clone());
        }
        for (channel_id, ticket) in &self.tickets {
            // Records always serialize; a failure here would be a bug in TicketRecord.
            let record = serde_json::to_value(ticket.to_record()).unwrap_or(Value::Null);
            entries.insert(channel_id.to_string(), record);
        }
        Value::Object(entries)
    }

    /// Content fingerprint of this document
    #[must_use]
    pub fn revision(&self) -> Revision {
        Revision::of(&self.to_json())
    }

    #[must_use]
    pub fn get(&self, channel_id: &ChannelId) -> Option<&Ticket> {
        self.tickets.get(channel_id)
    }

    pub fn get_mut(&mut self, channel_id: &ChannelId) -> Option<&mut Ticket> {
        self.tickets.get_mut(channel_id)
    }

    #[must_use]
    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.tickets.contains_key(channel_id) || self.preserved.contains_key(channel_id.as_str())
    }

    /// Insert or replace a ticket
    pub fn insert(&mut self, ticket: Ticket) -> Option<Ticket> {
        self.tickets.insert(ticket.channel_id.clone(), ticket)
    }

    pub fn remove(&mut self, channel_id: &ChannelId) -> Option<Ticket> {
        self.tickets.remove(channel_id)
    }

    /// All parsed tickets, ordered by channel id
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Number of entries kept verbatim because they could not be parsed
    #[must_use]
    pub fn preserved_len(&self) -> usize {
        self.preserved.len()
    }

    /// The open ticket an owner has in a category, if any
    #[must_use]
    pub fn find_open(&self, owner_id: &UserId, category: CategoryType) -> Option<&Ticket> {
        self.tickets
            .values()
            .find(|t| &t.owner_id == owner_id && t.category == category)
    }

    /// Highest ticket number among open tickets of a category
    #[must_use]
    pub fn max_number(&self, category: CategoryType) -> u32 {
        self.tickets
            .values()
            .filter(|t| t.category == category)
            .map(|t| t.ticket_number)
            .max()
            .unwrap_or(0)
    }

    /// Records whose channel is not in the live set
    pub fn orphans<'a>(&'a self, live: &'a [ChannelId]) -> impl Iterator<Item = &'a Ticket> + 'a {
        self.tickets
            .values()
            .filter(move |t| !live.contains(&t.channel_id))
    }
}
