//! Test utilities for ticket-desk
//!
//! [`TestDesk`] wires a lifecycle controller to the in-memory platform,
//! store and publisher with a fixed clock and a manual scheduler, so tests
//! can drive every operation deterministically.

#![cfg(test)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use crate::core::{CategoryType, ChannelId, RoleId, Ticket, UserId};
use crate::lifecycle::{
    AuthorizationPolicy, CategoryMap, CloseOutcome, ClosedTicket, FixedClock, LifecycleController,
    LifecycleSettings, ManualScheduler, PlatformHandles, parse_close_confirm_id,
};
use crate::permissions::{Overwrite, Permissions};
use crate::platform::{Member, MemoryPlatform};
use crate::storage::{MemoryStore, TicketLedger};
use crate::transcript::{MemoryPublisher, TranscriptArchiver};

pub const STAFF_ROLE: &str = "staff-role";
pub const BLACKLIST_ROLE: &str = "appeal-blacklist";
pub const EVERYONE_ROLE: &str = "everyone";

/// Template every test category starts with
pub fn category_template() -> Vec<Overwrite> {
    vec![
        Overwrite::role(
            RoleId::new(EVERYONE_ROLE),
            Permissions::NONE,
            Permissions::VIEW_CHANNEL,
        ),
        Overwrite::role(
            RoleId::new(STAFF_ROLE),
            Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            Permissions::NONE,
        ),
    ]
}

/// A fully wired controller over in-memory collaborators
pub struct TestDesk {
    pub platform: Arc<MemoryPlatform>,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub clock: Arc<FixedClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub categories: CategoryMap,
    pub log_channel: ChannelId,
    pub controller: Arc<LifecycleController>,
}

impl TestDesk {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// Desk over a pre-populated store
    pub fn with_store(store: MemoryStore) -> Self {
        let platform = Arc::new(MemoryPlatform::new());
        let categories = CategoryMap::new(
            platform.add_category("Reports", category_template()),
            platform.add_category("Appeals", category_template()),
            platform.add_category("Inquiries", category_template()),
        );
        let staff_area = platform.add_category("Staff", Vec::new());
        let log_channel = platform.add_text_channel("ticket-logs", &staff_area, Vec::new());

        let store = Arc::new(store);
        let publisher = Arc::new(MemoryPublisher::new("https://transcripts.example.com"));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
                .single()
                .expect("Failed to build start time"),
        ));
        let scheduler = Arc::new(ManualScheduler::new());

        let mut settings = LifecycleSettings::new(categories.clone(), log_channel.clone());
        settings.appeal_blacklist_role = Some(RoleId::new(BLACKLIST_ROLE));

        let controller = LifecycleController::new(
            TicketLedger::new(store.clone(), 3),
            PlatformHandles::from_platform(platform.clone()),
            TranscriptArchiver::new(publisher.clone()).expect("Failed to build archiver"),
            AuthorizationPolicy::new(vec![RoleId::new(STAFF_ROLE)]),
            settings,
        )
        .with_clock(clock.clone())
        .with_scheduler(scheduler.clone());
        let controller = Arc::new(controller);

        Self {
            platform,
            store,
            publisher,
            clock,
            scheduler,
            categories,
            log_channel,
            controller,
        }
    }

    fn register(&self, member: Member) -> UserId {
        let id = member.id.clone();
        self.platform.add_member(member);
        id
    }

    /// Register an ordinary member
    pub fn user(&self, name: &str) -> UserId {
        self.register(Member::new(name, name).with_roles(&[EVERYONE_ROLE]))
    }

    /// Register a member holding the staff role
    pub fn staff(&self, name: &str) -> UserId {
        self.register(Member::new(name, name).with_roles(&[EVERYONE_ROLE, STAFF_ROLE]))
    }

    /// Register an administrator without the staff role
    pub fn admin(&self, name: &str) -> UserId {
        self.register(
            Member::new(name, name)
                .with_roles(&[EVERYONE_ROLE])
                .with_permissions(Permissions::ADMINISTRATOR),
        )
    }

    /// Register a member who can manage channels
    pub fn moderator(&self, name: &str) -> UserId {
        self.register(
            Member::new(name, name)
                .with_roles(&[EVERYONE_ROLE])
                .with_permissions(Permissions::MANAGE_CHANNELS),
        )
    }

    /// Create a ticket, panicking on failure
    pub async fn open(&self, owner: &UserId, category: CategoryType) -> Ticket {
        self.controller
            .create(owner, category)
            .await
            .expect("Failed to create ticket")
            .value
    }

    /// Request and confirm a close, panicking on failure
    pub async fn close(&self, actor: &UserId, channel_id: &ChannelId) -> ClosedTicket {
        let prompt = self
            .controller
            .request_close(actor, channel_id)
            .await
            .expect("Failed to request close");
        let issued_at = prompt
            .components
            .iter()
            .filter_map(|c| c.id())
            .find_map(parse_close_confirm_id);

        let outcome = self
            .controller
            .confirm_close(actor, channel_id, issued_at, true)
            .await
            .expect("Failed to confirm close");
        match outcome.value {
            CloseOutcome::Closed(closed) => *closed,
            CloseOutcome::Cancelled => panic!("Close was cancelled"),
        }
    }

    /// Number of tickets in the store
    pub async fn ticket_count(&self) -> usize {
        self.controller
            .ledger()
            .snapshot("counting tickets")
            .await
            .expect("Failed to read store")
            .document
            .len()
    }
}
