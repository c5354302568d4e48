//! Shared harness for integration tests
//!
//! Wires a lifecycle controller to the in-memory platform, store and
//! publisher through the public API only.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use ticket_desk::core::{CategoryType, ChannelId, RoleId, Ticket, UserId};
use ticket_desk::lifecycle::{
    AuthorizationPolicy, CategoryMap, CloseOutcome, ClosedTicket, FixedClock, LifecycleController,
    LifecycleSettings, ManualScheduler, PlatformHandles, parse_close_confirm_id,
};
use ticket_desk::permissions::{Overwrite, Permissions};
use ticket_desk::platform::{Member, MemoryPlatform};
use ticket_desk::storage::{MemoryStore, TicketLedger};
use ticket_desk::transcript::{MemoryPublisher, TranscriptArchiver};

pub const STAFF_ROLE: &str = "staff";
pub const APPEALS_TEAM_ROLE: &str = "appeals-team";
pub const EVERYONE_ROLE: &str = "everyone";

pub fn base_template() -> Vec<Overwrite> {
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

/// Appeals add a dedicated team on top of the base template
pub fn appeals_template() -> Vec<Overwrite> {
    let mut template = base_template();
    template.push(Overwrite::role(
        RoleId::new(APPEALS_TEAM_ROLE),
        Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::READ_MESSAGE_HISTORY,
        Permissions::NONE,
    ));
    template
}

pub struct Desk {
    pub platform: Arc<MemoryPlatform>,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub clock: Arc<FixedClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub categories: CategoryMap,
    pub log_channel: ChannelId,
    pub controller: Arc<LifecycleController>,
}

impl Desk {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let platform = Arc::new(MemoryPlatform::new());
        let categories = CategoryMap::new(
            platform.add_category("Reports", base_template()),
            platform.add_category("Appeals", appeals_template()),
            platform.add_category("Inquiries", base_template()),
        );
        let staff_area = platform.add_category("Staff", Vec::new());
        let log_channel = platform.add_text_channel("ticket-logs", &staff_area, Vec::new());

        let store = Arc::new(store);
        let publisher = Arc::new(MemoryPublisher::new("https://transcripts.example.com"));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
        ));
        let scheduler = Arc::new(ManualScheduler::new());

        let controller = LifecycleController::new(
            TicketLedger::new(store.clone(), 3),
            PlatformHandles::from_platform(platform.clone()),
            TranscriptArchiver::new(publisher.clone()).unwrap(),
            AuthorizationPolicy::new(vec![RoleId::new(STAFF_ROLE)]),
            LifecycleSettings::new(categories.clone(), log_channel.clone()),
        )
        .with_clock(clock.clone())
        .with_scheduler(scheduler.clone());

        Self {
            platform,
            store,
            publisher,
            clock,
            scheduler,
            categories,
            log_channel,
            controller: Arc::new(controller),
        }
    }

    fn register(&self, member: Member) -> UserId {
        let id = member.id.clone();
        self.platform.add_member(member);
        id
    }

    pub fn user(&self, name: &str) -> UserId {
        self.register(Member::new(name, name).with_roles(&[EVERYONE_ROLE]))
    }

    pub fn staff(&self, name: &str) -> UserId {
        self.register(Member::new(name, name).with_roles(&[EVERYONE_ROLE, STAFF_ROLE]))
    }

    pub fn admin(&self, name: &str) -> UserId {
        self.register(
            Member::new(name, name)
                .with_roles(&[EVERYONE_ROLE])
                .with_permissions(Permissions::ADMINISTRATOR),
        )
    }

    pub async fn open(&self, owner: &UserId, category: CategoryType) -> Ticket {
        self.controller.create(owner, category).await.unwrap().value
    }

    pub async fn close(&self, actor: &UserId, channel_id: &ChannelId) -> ClosedTicket {
        let prompt = self.controller.request_close(actor, channel_id).await.unwrap();
        let issued_at = prompt
            .components
            .iter()
            .filter_map(|c| c.id())
            .find_map(parse_close_confirm_id);
        match self
            .controller
            .confirm_close(actor, channel_id, issued_at, true)
            .await
            .unwrap()
            .value
        {
            CloseOutcome::Closed(closed) => *closed,
            CloseOutcome::Cancelled => panic!("close was cancelled"),
        }
    }

    pub async fn ticket_count(&self) -> usize {
        self.controller
            .ledger()
            .snapshot("test")
            .await
            .unwrap()
            .document
            .len()
    }
}
