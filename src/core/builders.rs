use super::{CategoryType, ChannelId, Ticket, UserId};
use chrono::{DateTime, Utc};

/// Builder for creating Ticket instances
#[derive(Default)]
pub struct TicketBuilder {
    channel_id: Option<ChannelId>,
    owner_id: Option<UserId>,
    claimer_id: Option<UserId>,
    category: Option<CategoryType>,
    ticket_number: Option<u32>,
    created_at: Option<DateTime<Utc>>,
    custom_name: Option<String>,
}

impl TicketBuilder {
    /// Create a new ticket builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing channel
    #[must_use]
    pub fn channel(mut self, channel_id: impl Into<ChannelId>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Set the owner
    #[must_use]
    pub fn owner(mut self, owner_id: impl Into<UserId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Set the claimer
    #[must_use]
    pub fn claimer(mut self, claimer_id: impl Into<UserId>) -> Self {
        self.claimer_id = Some(claimer_id.into());
        self
    }

    /// Set the category type
    #[must_use]
    pub const fn category(mut self, category: CategoryType) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the per-category sequence number
    #[must_use]
    pub const fn number(mut self, ticket_number: u32) -> Self {
        self.ticket_number = Some(ticket_number);
        self
    }

    /// Set `created_at` timestamp
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Set the custom display name
    #[must_use]
    pub fn custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Build the ticket
    pub fn build(self) -> Ticket {
        Ticket {
            channel_id: self.channel_id.unwrap_or_else(|| ChannelId::new("0")),
            owner_id: self.owner_id.unwrap_or_else(|| UserId::new("0")),
            claimer_id: self.claimer_id,
            category: self.category.unwrap_or(CategoryType::Inquiry),
            ticket_number: self.ticket_number.unwrap_or(1),
            created_at: Some(self.created_at.unwrap_or_else(Utc::now)),
            custom_name: self.custom_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TicketStatus;

    #[test]
    fn test_ticket_builder() {
        let ticket = TicketBuilder::new()
            .channel("c9")
            .owner("u1")
            .claimer("staff")
            .category(CategoryType::Report)
            .number(7)
            .custom_name("Scam report")
            .build();

        assert_eq!(ticket.channel_id.as_str(), "c9");
        assert_eq!(ticket.owner_id.as_str(), "u1");
        assert_eq!(ticket.status(), TicketStatus::Claimed);
        assert_eq!(ticket.ticket_number, 7);
        assert_eq!(ticket.display_label(), "Report #7 (Scam report)");
    }
}
