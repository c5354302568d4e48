use chrono::Duration as ChronoDuration;
use std::time::Duration;

use crate::core::{CategoryType, ChannelId, RoleId};

/// Category channel backing each ticket type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    pub report: ChannelId,
    pub appeal: ChannelId,
    pub inquiry: ChannelId,
}

impl CategoryMap {
    pub fn new(
        report: impl Into<ChannelId>,
        appeal: impl Into<ChannelId>,
        inquiry: impl Into<ChannelId>,
    ) -> Self {
        Self {
            report: report.into(),
            appeal: appeal.into(),
            inquiry: inquiry.into(),
        }
    }

    #[must_use]
    pub const fn get(&self, category: CategoryType) -> &ChannelId {
        match category {
            CategoryType::Report => &self.report,
            CategoryType::Appeal => &self.appeal,
            CategoryType::Inquiry => &self.inquiry,
        }
    }

    /// Ticket type whose category channel is `channel_id`
    #[must_use]
    pub fn category_of(&self, channel_id: &ChannelId) -> Option<CategoryType> {
        CategoryType::ALL
            .into_iter()
            .find(|category| self.get(*category) == channel_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryType, &ChannelId)> {
        CategoryType::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }
}

/// Tunables the lifecycle controller reads on every operation
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub categories: CategoryMap,
    /// Audit destination for closure and blacklist records
    pub log_channel: ChannelId,
    /// Role that bars a member from opening appeals
    pub appeal_blacklist_role: Option<RoleId>,
    /// Most recent messages captured in a transcript
    pub transcript_message_limit: usize,
    /// How long a close confirmation prompt stays valid
    pub confirmation_ttl: ChronoDuration,
    /// Delay between closing a ticket and deleting its channel
    pub channel_delete_delay: Duration,
}

impl LifecycleSettings {
    pub fn new(categories: CategoryMap, log_channel: impl Into<ChannelId>) -> Self {
        Self {
            categories,
            log_channel: log_channel.into(),
            appeal_blacklist_role: None,
            transcript_message_limit: 100,
            confirmation_ttl: ChronoDuration::seconds(300),
            channel_delete_delay: Duration::from_secs(2),
        }
    }
}
