use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::policy::{Access, AuthorizationPolicy, Operation};
use super::scheduler::{TaskHandle, TaskScheduler, TokioScheduler};
use super::sequence::SequenceAllocator;
use super::settings::LifecycleSettings;
use crate::core::naming::{default_channel_name, renamed_channel_name};
use crate::core::{CategoryType, ChannelId, Ticket, UserId};
use crate::error::{DeskError, Precondition, Result};
use crate::integration::{EventBus, LifecycleEvent};
use crate::permissions::{PermissionSynchronizer, Permissions};
use crate::platform::{
    ButtonStyle, ChannelDirectory, Component, IdentityDirectory, Member, MessageHistory,
    OutboundMessage, SelectOption,
};
use crate::storage::TicketLedger;
use crate::transcript::{ArtifactReference, TranscriptArchiver, UNAVAILABLE_PLACEHOLDER};

/// Button on the welcome message that claims the ticket
pub const CLAIM_BUTTON_ID: &str = "claim_ticket";
/// Button that opens the close confirmation prompt
pub const CLOSE_REQUEST_ID: &str = "close_ticket";
/// Confirm button id prefix; the prompt's issue time follows in epoch millis
pub const CLOSE_CONFIRM_PREFIX: &str = "close:yes:";
pub const CLOSE_CANCEL_ID: &str = "close:no";
/// Selection menu offered by the move command
pub const MOVE_MENU_ID: &str = "move_ticket";

const PANEL_BUTTON_SUFFIX: &str = "_ticket";
const MAX_SUGGESTIONS: usize = 25;

/// Confirm button id for a prompt issued at `issued_at`
#[must_use]
pub fn close_confirm_id(issued_at: DateTime<Utc>) -> String {
    format!("{CLOSE_CONFIRM_PREFIX}{}", issued_at.timestamp_millis())
}

/// Issue time carried by a confirm button id
#[must_use]
pub fn parse_close_confirm_id(id: &str) -> Option<DateTime<Utc>> {
    let millis = id.strip_prefix(CLOSE_CONFIRM_PREFIX)?.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Panel button id for opening a ticket of `category`, e.g. `report_ticket`
#[must_use]
pub fn panel_button_id(category: CategoryType) -> String {
    format!("{}{PANEL_BUTTON_SUFFIX}", category.slug())
}

#[must_use]
pub fn parse_panel_button_id(id: &str) -> Option<CategoryType> {
    id.strip_suffix(PANEL_BUTTON_SUFFIX)?.parse().ok()
}

/// The three platform boundaries the controller drives
#[derive(Clone)]
pub struct PlatformHandles {
    pub channels: Arc<dyn ChannelDirectory>,
    pub identities: Arc<dyn IdentityDirectory>,
    pub history: Arc<dyn MessageHistory>,
}

impl PlatformHandles {
    /// Use one platform object for all three boundaries
    pub fn from_platform<P>(platform: Arc<P>) -> Self
    where
        P: ChannelDirectory + IdentityDirectory + MessageHistory + 'static,
    {
        Self {
            channels: platform.clone(),
            identities: platform.clone(),
            history: platform,
        }
    }
}

/// A successful transition plus any best-effort steps that failed
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub const fn new(value: T, warnings: Vec<String>) -> Self {
        Self { value, warnings }
    }
}

/// Everything that happened when a ticket closed
#[derive(Debug, Clone)]
pub struct ClosedTicket {
    pub ticket: Ticket,
    pub closed_by: UserId,
    pub closed_at: DateTime<Utc>,
    pub elapsed_days: Option<i64>,
    pub transcript: ArtifactReference,
    /// Pending deletion of the backing channel
    pub deletion: TaskHandle,
}

#[derive(Debug, Clone)]
pub enum CloseOutcome {
    Cancelled,
    Closed(Box<ClosedTicket>),
}

/// Ticket lifecycle state machine
pub struct LifecycleController {
    ledger: TicketLedger,
    platform: PlatformHandles,
    permissions: PermissionSynchronizer,
    archiver: TranscriptArchiver,
    policy: AuthorizationPolicy,
    sequence: SequenceAllocator,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn TaskScheduler>,
    events: EventBus,
    settings: LifecycleSettings,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("ledger", &self.ledger)
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    pub fn new(
        ledger: TicketLedger,
        platform: PlatformHandles,
        archiver: TranscriptArchiver,
        policy: AuthorizationPolicy,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            permissions: PermissionSynchronizer::new(platform.channels.clone()),
            ledger,
            platform,
            archiver,
            policy,
            sequence: SequenceAllocator::new(),
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(TokioScheduler),
            events: EventBus::default(),
            settings,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub const fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    #[must_use]
    pub const fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    /// Prime the ticket number cache from the store
    pub async fn restore_sequence(&self) -> Result<()> {
        let snapshot = self.ledger.snapshot("restoring ticket numbers").await?;
        self.sequence.observe(&snapshot.document);
        info!(
            tickets = snapshot.document.len(),
            next_report = self.sequence.peek(CategoryType::Report),
            next_appeal = self.sequence.peek(CategoryType::Appeal),
            next_inquiry = self.sequence.peek(CategoryType::Inquiry),
            "Restored ticket numbering"
        );
        Ok(())
    }

    /// Open a new ticket of `category` for `actor`
    pub async fn create(&self, actor: &UserId, category: CategoryType) -> Result<Outcome<Ticket>> {
        let (member, _) = self.authorize(Operation::Create, actor).await?;
        let blacklisted = self
            .settings
            .appeal_blacklist_role
            .as_ref()
            .is_some_and(|role| member.has_any_role(std::slice::from_ref(role)));
        if category == CategoryType::Appeal && blacklisted {
            return Err(Precondition::AppealBlacklisted.into());
        }

        let snapshot = self.ledger.snapshot("creating ticket").await?;
        if let Some(existing) = snapshot.document.find_open(actor, category) {
            return Err(duplicate(existing));
        }
        self.sequence.observe(&snapshot.document);
        let number = self.sequence.next(category);

        let parent = self.settings.categories.get(category).clone();
        let name = default_channel_name(category, number);
        let topic = format!("{category} ticket #{number} opened by {}", actor.mention());
        let channel = self
            .platform
            .channels
            .create_channel(&name, &parent, &topic)
            .await?;

        let mut warnings = Vec::new();
        best_effort(
            &mut warnings,
            &channel.id,
            "Permission sync",
            self.permissions
                .sync_from_category(&channel.id, &parent, actor)
                .await
                .map(drop),
        );

        let ticket = Ticket::new(
            channel.id.clone(),
            actor.clone(),
            category,
            number,
            self.clock.now(),
        );
        let written = self
            .ledger
            .update("recording new ticket", |document| {
                if let Some(existing) = document.find_open(&ticket.owner_id, ticket.category) {
                    return Err(duplicate(existing));
                }
                document.insert(ticket.clone());
                Ok(())
            })
            .await;

        if let Err(e) = written {
            if e.is_rejection() {
                // Another request for the same owner and category won the race.
                if let Err(delete_err) = self.platform.channels.delete_channel(&channel.id).await {
                    warn!(channel = %channel.id, error = %delete_err, "Could not remove duplicate ticket channel");
                }
                return Err(e);
            }
            return Err(partial("channel creation", &channel.id, e));
        }

        best_effort(
            &mut warnings,
            &channel.id,
            "Welcome message",
            self.platform
                .channels
                .post_message(&channel.id, welcome_message(&ticket))
                .await,
        );

        info!(
            channel = %ticket.channel_id,
            owner = %ticket.owner_id,
            category = %category,
            number,
            "Ticket created"
        );
        self.events.publish(LifecycleEvent::Created {
            channel_id: ticket.channel_id.clone(),
            owner_id: ticket.owner_id.clone(),
            category,
            ticket_number: number,
        });
        Ok(Outcome::new(ticket, warnings))
    }

    /// Take responsibility for a ticket
    pub async fn claim(&self, actor: &UserId, channel_id: &ChannelId) -> Result<Outcome<Ticket>> {
        self.authorize(Operation::Claim, actor).await?;

        let ticket = self
            .ledger
            .update("claiming ticket", |document| {
                let ticket = document
                    .get_mut(channel_id)
                    .ok_or_else(|| not_a_ticket(channel_id))?;
                if let Some(claimer) = &ticket.claimer_id {
                    return Err(Precondition::AlreadyClaimed {
                        claimer: claimer.to_string(),
                    }
                    .into());
                }
                ticket.claimer_id = Some(actor.clone());
                Ok(ticket.clone())
            })
            .await?;

        let mut warnings = Vec::new();
        best_effort(
            &mut warnings,
            channel_id,
            "Claimer grant",
            self.permissions
                .grant(channel_id, actor, Permissions::CLAIMER_GRANT)
                .await,
        );

        info!(channel = %channel_id, claimer = %actor, "Ticket claimed");
        self.events.publish(LifecycleEvent::Claimed {
            channel_id: channel_id.clone(),
            claimer_id: actor.clone(),
        });
        Ok(Outcome::new(ticket, warnings))
    }

    /// Hand a ticket to a different owner
    pub async fn transfer(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        new_owner: &UserId,
    ) -> Result<Outcome<Ticket>> {
        self.authorize(Operation::Transfer, actor).await?;

        let current = self.open_ticket(channel_id, "transferring ticket").await?;
        if self
            .platform
            .identities
            .fetch_member(new_owner)
            .await?
            .is_none()
        {
            return Err(Precondition::NotAMember {
                user: new_owner.to_string(),
            }
            .into());
        }
        if &current.owner_id == new_owner {
            return Err(Precondition::SameOwner.into());
        }

        let (previous_owner, ticket) = self
            .ledger
            .update("transferring ticket", |document| {
                let ticket = document
                    .get_mut(channel_id)
                    .ok_or_else(|| not_a_ticket(channel_id))?;
                if &ticket.owner_id == new_owner {
                    return Err(Precondition::SameOwner.into());
                }
                let previous = std::mem::replace(&mut ticket.owner_id, new_owner.clone());
                Ok((previous, ticket.clone()))
            })
            .await?;

        let mut warnings = Vec::new();
        let parent = self.current_parent(&ticket).await;
        best_effort(
            &mut warnings,
            channel_id,
            "Permission sync",
            self.permissions
                .sync_from_category(channel_id, &parent, new_owner)
                .await
                .map(drop),
        );
        best_effort(
            &mut warnings,
            channel_id,
            "Previous owner revoke",
            self.permissions.revoke(channel_id, &previous_owner).await,
        );

        let label = ticket.display_label();
        self.notify(
            &previous_owner,
            OutboundMessage::text(format!(
                "Your ticket {label} has been transferred to {}.",
                new_owner.mention()
            )),
        )
        .await;
        self.notify(
            new_owner,
            OutboundMessage::text(format!(
                "You are now the owner of ticket {label} ({}).",
                channel_id.mention()
            )),
        )
        .await;

        info!(
            channel = %channel_id,
            from = %previous_owner,
            to = %new_owner,
            by = %actor,
            "Ticket transferred"
        );
        self.events.publish(LifecycleEvent::Transferred {
            channel_id: channel_id.clone(),
            from: previous_owner,
            to: new_owner.clone(),
        });
        Ok(Outcome::new(ticket, warnings))
    }

    /// Rename the backing channel and remember the requested name
    pub async fn rename(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        requested: &str,
    ) -> Result<Outcome<Ticket>> {
        self.authorize(Operation::Rename, actor).await?;
        let name = renamed_channel_name(requested).ok_or(Precondition::InvalidName)?;
        self.open_ticket(channel_id, "renaming ticket").await?;

        self.platform
            .channels
            .rename_channel(channel_id, &name)
            .await?;

        let custom_name = requested.trim().to_string();
        let ticket = self
            .ledger
            .update("recording ticket name", |document| {
                let ticket = document
                    .get_mut(channel_id)
                    .ok_or_else(|| not_a_ticket(channel_id))?;
                ticket.custom_name = Some(custom_name.clone());
                Ok(ticket.clone())
            })
            .await
            .map_err(|e| partial("channel rename", channel_id, e))?;

        info!(channel = %channel_id, name = %name, by = %actor, "Ticket renamed");
        self.events.publish(LifecycleEvent::Renamed {
            channel_id: channel_id.clone(),
            name,
        });
        Ok(Outcome::new(ticket, Vec::new()))
    }

    /// Selection menu listing the categories a ticket can move to
    pub async fn move_menu(&self, actor: &UserId, channel_id: &ChannelId) -> Result<OutboundMessage> {
        self.authorize(Operation::Move, actor).await?;
        self.open_ticket(channel_id, "preparing move").await?;

        let options = self
            .settings
            .categories
            .iter()
            .map(|(category, id)| SelectOption {
                label: category.to_string(),
                value: id.to_string(),
            })
            .collect();
        Ok(OutboundMessage::text("Select a category to move this ticket to.").component(
            Component::Select {
                id: MOVE_MENU_ID.to_string(),
                placeholder: "Choose a category".to_string(),
                options,
            },
        ))
    }

    /// Reparent the channel and rebuild its overwrites from the new category
    ///
    /// The ticket's category type stays what it was at creation.
    pub async fn move_to(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        target: &ChannelId,
    ) -> Result<Outcome<Ticket>> {
        self.authorize(Operation::Move, actor).await?;
        if self.settings.categories.category_of(target).is_none() {
            return Err(Precondition::UnknownCategory {
                category: target.to_string(),
            }
            .into());
        }
        let ticket = self.open_ticket(channel_id, "moving ticket").await?;

        let previous = self
            .platform
            .channels
            .channel(channel_id)
            .await?
            .and_then(|info| info.parent_id);
        self.platform
            .channels
            .reparent_channel(channel_id, target)
            .await?;

        let mut warnings = Vec::new();
        best_effort(
            &mut warnings,
            channel_id,
            "Permission sync",
            self.permissions
                .sync_from_category(channel_id, target, &ticket.owner_id)
                .await
                .map(drop),
        );

        info!(channel = %channel_id, to = %target, by = %actor, "Ticket moved");
        self.events.publish(LifecycleEvent::Moved {
            channel_id: channel_id.clone(),
            from: previous,
            to: target.clone(),
        });
        Ok(Outcome::new(ticket, warnings))
    }

    /// Build the yes/no close prompt; changes nothing
    pub async fn request_close(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
    ) -> Result<OutboundMessage> {
        let (_, access) = self.authorize(Operation::RequestClose, actor).await?;
        let ticket = self.open_ticket(channel_id, "requesting close").await?;
        access.confirm_owner(Operation::RequestClose, actor, &ticket.owner_id)?;

        let issued_at = self.clock.now();
        Ok(OutboundMessage::text("Are you sure you want to close this ticket?")
            .component(Component::button(
                close_confirm_id(issued_at),
                "Yes",
                ButtonStyle::Danger,
            ))
            .component(Component::button(
                CLOSE_CANCEL_ID,
                "Cancel",
                ButtonStyle::Secondary,
            )))
    }

    /// Answer a close prompt issued at `issued_at`
    ///
    /// Confirming removes the ticket from the store first, then archives the
    /// transcript, records the closure and schedules deletion of the channel.
    pub async fn confirm_close(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        issued_at: Option<DateTime<Utc>>,
        confirmed: bool,
    ) -> Result<Outcome<CloseOutcome>> {
        let (_, access) = self.authorize(Operation::ConfirmClose, actor).await?;
        if !confirmed {
            debug!(channel = %channel_id, by = %actor, "Close cancelled");
            return Ok(Outcome::new(CloseOutcome::Cancelled, Vec::new()));
        }

        let now = self.clock.now();
        let fresh = issued_at
            .is_some_and(|at| at <= now && now - at <= self.settings.confirmation_ttl);
        if !fresh {
            return Err(Precondition::ConfirmationExpired.into());
        }

        // Removing the record claims the close; a second confirm finds no ticket.
        let ticket = self
            .ledger
            .update("closing ticket", |document| {
                let owner = document
                    .get(channel_id)
                    .map(|ticket| ticket.owner_id.clone())
                    .ok_or_else(|| not_a_ticket(channel_id))?;
                access.confirm_owner(Operation::ConfirmClose, actor, &owner)?;
                document
                    .remove(channel_id)
                    .ok_or_else(|| not_a_ticket(channel_id))
            })
            .await?;

        let mut warnings = Vec::new();
        let mut messages = match self
            .platform
            .history
            .recent_messages(channel_id, self.settings.transcript_message_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "Could not read ticket history");
                warnings.push(format!("Message history unavailable: {e}"));
                Vec::new()
            },
        };
        messages.reverse();

        let channel_name = match self.platform.channels.channel(channel_id).await {
            Ok(Some(info)) => info.name,
            _ => default_channel_name(ticket.category, ticket.ticket_number),
        };
        let transcript = self
            .archiver
            .archive(channel_id, &channel_name, &messages)
            .await;
        if !transcript.is_published() {
            warnings.push(UNAVAILABLE_PLACEHOLDER.to_string());
        }

        let elapsed_days = ticket.elapsed_days(now);
        let record = closure_record(&ticket, &channel_name, actor, &transcript, elapsed_days);
        best_effort(
            &mut warnings,
            channel_id,
            "Audit record",
            self.platform
                .channels
                .post_message(&self.settings.log_channel, record.clone())
                .await,
        );
        self.notify(&ticket.owner_id, record).await;

        let channels = self.platform.channels.clone();
        let doomed = channel_id.clone();
        let deletion = self.scheduler.schedule(
            &format!("delete channel {channel_id}"),
            self.settings.channel_delete_delay,
            Box::pin(async move {
                if let Err(e) = channels.delete_channel(&doomed).await {
                    debug!(channel = %doomed, error = %e, "Scheduled channel deletion failed");
                }
            }),
        );

        info!(
            channel = %channel_id,
            by = %actor,
            transcript = transcript.locator(),
            "Ticket closed"
        );
        self.events.publish(LifecycleEvent::Closed {
            channel_id: channel_id.clone(),
            closed_by: actor.clone(),
            closed_at: now,
            transcript_url: transcript.url.clone(),
        });

        Ok(Outcome::new(
            CloseOutcome::Closed(Box::new(ClosedTicket {
                ticket,
                closed_by: actor.clone(),
                closed_at: now,
                elapsed_days,
                transcript,
                deletion,
            })),
            warnings,
        ))
    }

    /// Give a third party access to the ticket
    pub async fn add_participant(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<Outcome<()>> {
        self.authorize(Operation::AddParticipant, actor).await?;
        self.open_ticket(channel_id, "adding participant").await?;
        self.require_member(user_id).await?;

        self.permissions
            .grant(channel_id, user_id, Permissions::PARTICIPANT_GRANT)
            .await?;

        info!(channel = %channel_id, user = %user_id, by = %actor, "Participant added");
        self.events.publish(LifecycleEvent::ParticipantAdded {
            channel_id: channel_id.clone(),
            user_id: user_id.clone(),
        });
        Ok(Outcome::new((), Vec::new()))
    }

    /// Take a third party's access away; owners may do this on their own ticket
    pub async fn remove_participant(
        &self,
        actor: &UserId,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<Outcome<()>> {
        let (_, access) = self
            .authorize(Operation::RemoveParticipant, actor)
            .await?;
        let ticket = self.open_ticket(channel_id, "removing participant").await?;
        access.confirm_owner(Operation::RemoveParticipant, actor, &ticket.owner_id)?;
        if &ticket.owner_id == user_id {
            return Err(Precondition::OwnerCannotBeRemoved.into());
        }

        self.permissions.revoke(channel_id, user_id).await?;

        info!(channel = %channel_id, user = %user_id, by = %actor, "Participant removed");
        self.events.publish(LifecycleEvent::ParticipantRemoved {
            channel_id: channel_id.clone(),
            user_id: user_id.clone(),
        });
        Ok(Outcome::new((), Vec::new()))
    }

    /// Members with explicit access to the ticket whose tag contains `query`
    ///
    /// Bots are never suggested. Outside a ticket channel there are no
    /// suggestions.
    pub async fn suggest_participants(
        &self,
        channel_id: &ChannelId,
        query: &str,
    ) -> Result<Vec<Member>> {
        match self.open_ticket(channel_id, "suggesting participants").await {
            Ok(_) => {},
            Err(DeskError::PreconditionFailed(Precondition::NotATicket { .. })) => {
                return Ok(Vec::new());
            },
            Err(e) => return Err(e),
        }

        let query = query.to_lowercase();
        let mut suggestions = Vec::new();
        for user_id in self.platform.channels.list_members(channel_id).await? {
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
            let Some(member) = self.platform.identities.fetch_member(&user_id).await? else {
                continue;
            };
            if !member.bot && member.tag.to_lowercase().contains(&query) {
                suggestions.push(member);
            }
        }
        Ok(suggestions)
    }

    /// Bar a member from opening appeals
    pub async fn blacklist_appeal(
        &self,
        actor: &UserId,
        user_id: &UserId,
        reason: &str,
    ) -> Result<Outcome<Member>> {
        self.authorize(Operation::BlacklistAppeal, actor).await?;
        let role = self
            .settings
            .appeal_blacklist_role
            .clone()
            .ok_or_else(|| DeskError::Config("No appeal blacklist role is configured".to_string()))?;
        let member = self.require_member(user_id).await?;

        self.platform.identities.add_role(user_id, &role).await?;

        let mut warnings = Vec::new();
        best_effort(
            &mut warnings,
            &self.settings.log_channel,
            "Audit record",
            self.platform
                .channels
                .post_message(
                    &self.settings.log_channel,
                    OutboundMessage::text("Appeal Blacklist")
                        .field("User", user_id.mention())
                        .field("By", actor.mention())
                        .field("Reason", reason),
                )
                .await,
        );

        info!(user = %user_id, by = %actor, reason, "Member blacklisted from appeals");
        Ok(Outcome::new(member, warnings))
    }

    /// Post the "open a ticket" panel into `channel_id`
    pub async fn setup_panel(&self, actor: &UserId, channel_id: &ChannelId) -> Result<()> {
        self.authorize(Operation::SetupPanel, actor).await?;

        let panel = CategoryType::ALL.into_iter().fold(
            OutboundMessage::text(
                "Need help? Choose a ticket type below to open a private channel with staff.",
            ),
            |panel, category| {
                panel.component(Component::button(
                    panel_button_id(category),
                    category.panel_label(),
                    ButtonStyle::Primary,
                ))
            },
        );
        self.platform.channels.post_message(channel_id, panel).await?;
        info!(channel = %channel_id, by = %actor, "Ticket panel posted");
        Ok(())
    }

    /// Tickets whose channel no longer exists under any ticket category
    ///
    /// Report only; nothing is deleted.
    pub async fn orphaned_tickets(&self) -> Result<Vec<Ticket>> {
        let mut live = Vec::new();
        for (_, category_id) in self.settings.categories.iter() {
            live.extend(self.platform.channels.list_children(category_id).await?);
        }
        let snapshot = self.ledger.snapshot("reconciling tickets").await?;
        let orphans: Vec<Ticket> = snapshot.document.orphans(&live).cloned().collect();
        for ticket in &orphans {
            warn!(channel = %ticket.channel_id, owner = %ticket.owner_id, "Ticket record has no live channel");
        }
        Ok(orphans)
    }

    async fn authorize(&self, operation: Operation, actor: &UserId) -> Result<(Member, Access)> {
        let member = self
            .platform
            .identities
            .fetch_member(actor)
            .await?
            .ok_or_else(|| DeskError::unauthorized(operation, "not a member of this server"))?;
        match self.policy.evaluate(operation, &member) {
            Ok(access) => Ok((member, access)),
            Err(e) => {
                warn!(actor = %actor, operation = %operation, "Rejected unauthorized request");
                Err(e)
            },
        }
    }

    async fn require_member(&self, user_id: &UserId) -> Result<Member> {
        self.platform
            .identities
            .fetch_member(user_id)
            .await?
            .ok_or_else(|| {
                Precondition::NotAMember {
                    user: user_id.to_string(),
                }
                .into()
            })
    }

    async fn open_ticket(&self, channel_id: &ChannelId, context: &str) -> Result<Ticket> {
        let snapshot = self.ledger.snapshot(context).await?;
        snapshot
            .document
            .get(channel_id)
            .cloned()
            .ok_or_else(|| not_a_ticket(channel_id))
    }

    /// Category the channel sits under now, falling back to its intake category
    async fn current_parent(&self, ticket: &Ticket) -> ChannelId {
        match self.platform.channels.channel(&ticket.channel_id).await {
            Ok(Some(info)) => info
                .parent_id
                .unwrap_or_else(|| self.settings.categories.get(ticket.category).clone()),
            _ => self.settings.categories.get(ticket.category).clone(),
        }
    }

    async fn notify(&self, user_id: &UserId, message: OutboundMessage) {
        if let Err(e) = self
            .platform
            .identities
            .send_direct_message(user_id, message)
            .await
        {
            debug!(user = %user_id, error = %e, "Direct message not delivered");
        }
    }
}

fn not_a_ticket(channel_id: &ChannelId) -> DeskError {
    Precondition::NotATicket {
        channel: channel_id.to_string(),
    }
    .into()
}

fn duplicate(existing: &Ticket) -> DeskError {
    Precondition::DuplicateTicket {
        channel: existing.channel_id.to_string(),
        category: existing.category.to_string(),
    }
    .into()
}

fn partial(effect: &str, channel_id: &ChannelId, err: DeskError) -> DeskError {
    error!(
        channel = %channel_id,
        effect,
        error = %err,
        "Store not updated after external side effect, reconcile manually"
    );
    DeskError::ExternalSideEffectPartial {
        effect: effect.to_string(),
        message: err.to_string(),
    }
}

fn best_effort(warnings: &mut Vec<String>, channel_id: &ChannelId, step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(channel = %channel_id, step, error = %e, "Best-effort step failed");
        warnings.push(format!("{step} failed: {e}"));
    }
}

fn welcome_message(ticket: &Ticket) -> OutboundMessage {
    OutboundMessage::text(format!(
        "{} Thanks for opening a ticket. Staff will be with you shortly.",
        ticket.owner_id.mention()
    ))
    .field("Ticket", ticket.display_label())
    .field("Category", ticket.category.as_str())
    .component(Component::button(
        CLAIM_BUTTON_ID,
        "Claim",
        ButtonStyle::Success,
    ))
    .component(Component::button(
        CLOSE_REQUEST_ID,
        "Close",
        ButtonStyle::Danger,
    ))
}

fn closure_record(
    ticket: &Ticket,
    channel_name: &str,
    closed_by: &UserId,
    transcript: &ArtifactReference,
    elapsed_days: Option<i64>,
) -> OutboundMessage {
    let open_for = match elapsed_days {
        Some(1) => "1 day".to_string(),
        Some(days) => format!("{days} days"),
        None => "unknown".to_string(),
    };
    let record = OutboundMessage::text("Ticket Closed")
        .field("Ticket", channel_name)
        .field("Closed By", closed_by.mention())
        .field("Owner", ticket.owner_id.mention())
        .field("Open For", open_for);

    match &transcript.url {
        Some(url) => record.component(Component::Link {
            label: "Transcript".to_string(),
            url: url.clone(),
        }),
        None => record.field("Transcript", UNAVAILABLE_PLACEHOLDER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ChannelDirectory, ChannelMessage};
    use crate::test_utils::TestDesk;
    use chrono::Duration;

    #[test]
    fn test_button_ids_round_trip() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(parse_close_confirm_id(&close_confirm_id(at)), Some(at));
        assert_eq!(parse_close_confirm_id(CLOSE_CANCEL_ID), None);
        assert_eq!(panel_button_id(CategoryType::Report), "report_ticket");
        assert_eq!(
            parse_panel_button_id("appeal_ticket"),
            Some(CategoryType::Appeal)
        );
        assert_eq!(parse_panel_button_id(CLAIM_BUTTON_ID), None);
        assert_eq!(parse_panel_button_id(CLOSE_REQUEST_ID), None);
    }

    #[tokio::test]
    async fn test_create_posts_welcome_and_syncs_permissions() {
        let desk = TestDesk::new();
        let outcome = desk
            .controller
            .create(&desk.user("alice"), CategoryType::Report)
            .await
            .expect("Failed to create ticket");
        let ticket = outcome.value;

        assert_eq!(ticket.ticket_number, 1);
        assert!(outcome.warnings.is_empty());
        let channel = desk.platform.channel_snapshot(&ticket.channel_id).unwrap();
        assert_eq!(channel.name, "ticket-report-0001");
        assert_eq!(channel.parent_id.as_ref(), Some(&desk.categories.report));
        let posted = desk.platform.posted(&ticket.channel_id);
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].components[0].id(), Some(CLAIM_BUTTON_ID));
        assert!(
            desk.platform
                .overwrites(&ticket.channel_id)
                .iter()
                .any(|o| o.allow == Permissions::OWNER_GRANT)
        );
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        desk.controller
            .create(&alice, CategoryType::Appeal)
            .await
            .unwrap();

        let err = desk
            .controller
            .create(&alice, CategoryType::Appeal)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::DuplicateTicket { .. })
        ));
        assert_eq!(desk.ticket_count().await, 1);
        assert_eq!(desk.platform.text_channels().len(), 1);
    }

    #[tokio::test]
    async fn test_blacklisted_member_cannot_open_appeal() {
        let desk = TestDesk::new();
        let mallory = desk.user("mallory");
        desk.controller
            .blacklist_appeal(&desk.staff("bob"), &mallory, "spam")
            .await
            .unwrap();

        let err = desk
            .controller
            .create(&mallory, CategoryType::Appeal)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::AppealBlacklisted)
        ));
        assert!(
            desk.controller
                .create(&mallory, CategoryType::Inquiry)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_create_aborts_when_store_unreadable() {
        let desk = TestDesk::new();
        desk.store.set_fail_reads(true);

        let err = desk
            .controller
            .create(&desk.user("alice"), CategoryType::Report)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::StoreUnavailable { .. }));
        assert!(desk.platform.text_channels().is_empty());
    }

    #[tokio::test]
    async fn test_create_reports_partial_when_write_fails() {
        let desk = TestDesk::new();
        desk.store.set_fail_writes(true);

        let err = desk
            .controller
            .create(&desk.user("alice"), CategoryType::Report)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::ExternalSideEffectPartial { .. }));
        assert_eq!(desk.platform.text_channels().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_claim_changes_nothing() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Inquiry).await;
        let before = desk.store.writes();

        let err = desk
            .controller
            .claim(&desk.user("eve"), &ticket.channel_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Unauthorized { .. }));
        assert_eq!(desk.store.writes(), before);
    }

    #[tokio::test]
    async fn test_permission_failure_does_not_abort_claim() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Inquiry).await;
        desk.platform.set_fail_overwrites(true);

        let outcome = desk
            .controller
            .claim(&desk.staff("bob"), &ticket.channel_id)
            .await
            .expect("Claim should succeed despite permission failure");
        assert_eq!(outcome.value.claimer_id, Some(desk.staff("bob")));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_partial_when_store_write_fails() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Report).await;
        desk.store.set_fail_writes(true);

        let err = desk
            .controller
            .rename(&desk.staff("bob"), &ticket.channel_id, "Billing")
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::ExternalSideEffectPartial { .. }));
        assert_eq!(
            desk.platform.channel_snapshot(&ticket.channel_id).unwrap().name,
            "ticket-billing"
        );
    }

    #[tokio::test]
    async fn test_rename_rejects_blank_name() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Report).await;

        let err = desk
            .controller
            .rename(&desk.staff("bob"), &ticket.channel_id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::InvalidName)
        ));
    }

    #[tokio::test]
    async fn test_move_requires_configured_category() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Report).await;
        let elsewhere = desk.platform.add_category("Off topic", Vec::new());

        let err = desk
            .controller
            .move_to(&desk.moderator("mod"), &ticket.channel_id, &elsewhere)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::UnknownCategory { .. })
        ));
    }

    #[tokio::test]
    async fn test_move_keeps_category_type() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Report).await;

        let outcome = desk
            .controller
            .move_to(
                &desk.moderator("mod"),
                &ticket.channel_id,
                &desk.categories.appeal,
            )
            .await
            .unwrap();
        assert_eq!(outcome.value.category, CategoryType::Report);
        let info = desk
            .platform
            .channel(&ticket.channel_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.parent_id, Some(desk.categories.appeal.clone()));
    }

    #[tokio::test]
    async fn test_cancelled_close_changes_nothing() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;

        let outcome = desk
            .controller
            .confirm_close(&alice, &ticket.channel_id, None, false)
            .await
            .unwrap();
        assert!(matches!(outcome.value, CloseOutcome::Cancelled));
        assert_eq!(desk.ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_confirmation_is_rejected() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        let issued_at = desk.clock.now();
        desk.clock.advance(Duration::minutes(10));

        let err = desk
            .controller
            .confirm_close(&alice, &ticket.channel_id, Some(issued_at), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::ConfirmationExpired)
        ));
        assert_eq!(desk.ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_close() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Inquiry).await;

        let err = desk
            .controller
            .request_close(&desk.user("eve"), &ticket.channel_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_close_survives_publish_and_history_failures() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        desk.publisher.set_fail(true);
        desk.platform.set_fail_history(true);

        let closed = desk.close(&alice, &ticket.channel_id).await;
        assert!(!closed.transcript.is_published());
        assert_eq!(desk.ticket_count().await, 0);
        let audit = desk.platform.posted(&desk.log_channel);
        assert_eq!(audit.len(), 1);
        assert!(
            audit[0]
                .fields
                .iter()
                .any(|(name, value)| name == "Transcript" && value == UNAVAILABLE_PLACEHOLDER)
        );
    }

    #[tokio::test]
    async fn test_close_has_no_side_effects_when_store_write_fails() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        let prompt = desk
            .controller
            .request_close(&alice, &ticket.channel_id)
            .await
            .unwrap();
        let issued_at = prompt.components[0]
            .id()
            .and_then(parse_close_confirm_id)
            .unwrap();
        desk.store.set_fail_writes(true);

        let err = desk
            .controller
            .confirm_close(&alice, &ticket.channel_id, Some(issued_at), true)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::StoreUnavailable { .. }));
        assert_eq!(desk.scheduler.pending_count(), 0);
        assert!(desk.platform.exists(&ticket.channel_id));
        assert!(desk.platform.posted(&desk.log_channel).is_empty());
        assert!(desk.platform.direct_messages(&alice).is_empty());
        assert!(desk.publisher.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_confirms_close_once() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        desk.store.set_interleave(true);
        let issued_at = Some(desk.clock.now());

        let (first, second) = tokio::join!(
            desk.controller
                .confirm_close(&alice, &ticket.channel_id, issued_at, true),
            desk.controller
                .confirm_close(&alice, &ticket.channel_id, issued_at, true),
        );

        let (closed, rejected) = match (first, second) {
            (Ok(closed), Err(rejected)) | (Err(rejected), Ok(closed)) => (closed, rejected),
            (first, second) => panic!(
                "expected exactly one close, got {:?} and {:?}",
                first.is_ok(),
                second.is_ok()
            ),
        };
        assert!(matches!(closed.value, CloseOutcome::Closed(_)));
        assert!(matches!(
            rejected,
            DeskError::PreconditionFailed(Precondition::NotATicket { .. })
        ));
        assert_eq!(desk.platform.posted(&desk.log_channel).len(), 1);
        assert_eq!(desk.platform.direct_messages(&alice).len(), 1);
        assert_eq!(desk.publisher.len(), 1);
        assert_eq!(desk.scheduler.pending_count(), 1);
        assert_eq!(desk.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_succeeds_when_owner_blocks_direct_messages() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        desk.platform.block_direct_messages(&alice);

        let issued_at = Some(desk.clock.now());
        let outcome = desk
            .controller
            .confirm_close(&alice, &ticket.channel_id, issued_at, true)
            .await
            .unwrap();

        assert!(matches!(outcome.value, CloseOutcome::Closed(_)));
        assert!(outcome.warnings.is_empty());
        assert!(desk.platform.direct_messages(&alice).is_empty());
        assert_eq!(desk.platform.posted(&desk.log_channel).len(), 1);
        assert_eq!(desk.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_transcript_keeps_most_recent_window_oldest_first() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        let limit = desk.controller.settings().transcript_message_limit;
        let start = desk.clock.now();
        for index in 0..limit + 5 {
            desk.platform.push_message(
                &ticket.channel_id,
                ChannelMessage {
                    id: format!("m{index}"),
                    author_id: alice.clone(),
                    author_tag: "alice".to_string(),
                    content: format!("line-{index:04}"),
                    attachments: Vec::new(),
                    timestamp: start + Duration::seconds(index as i64),
                },
            );
        }

        desk.controller
            .confirm_close(&alice, &ticket.channel_id, Some(start), true)
            .await
            .unwrap();

        let html = desk
            .publisher
            .document(&crate::transcript::transcript_key(&ticket.channel_id))
            .expect("transcript published");
        for dropped in 0..5 {
            assert!(!html.contains(&format!("line-{dropped:04}")));
        }
        let oldest = html.find("line-0005").expect("oldest kept message");
        let newest = html
            .find(&format!("line-{:04}", limit + 4))
            .expect("newest message");
        assert!(oldest < newest);
        assert_eq!(html.matches("line-").count(), limit);
    }

    #[tokio::test]
    async fn test_deletion_failure_is_swallowed() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;
        desk.close(&alice, &ticket.channel_id).await;

        desk.platform
            .delete_channel(&ticket.channel_id)
            .await
            .unwrap();
        assert_eq!(desk.scheduler.advance(std::time::Duration::from_secs(2)).await, 1);
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Report).await;

        let err = desk
            .controller
            .remove_participant(&desk.staff("bob"), &ticket.channel_id, &alice)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::OwnerCannotBeRemoved)
        ));
    }

    #[tokio::test]
    async fn test_owner_can_remove_participant_others_cannot() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let carol = desk.user("carol");
        let eve = desk.user("eve");
        let ticket = desk.open(&alice, CategoryType::Report).await;
        desk.controller
            .add_participant(&desk.staff("bob"), &ticket.channel_id, &carol)
            .await
            .unwrap();

        let err = desk
            .controller
            .remove_participant(&eve, &ticket.channel_id, &carol)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Unauthorized { .. }));

        desk.controller
            .remove_participant(&alice, &ticket.channel_id, &carol)
            .await
            .unwrap();
        assert!(
            !desk
                .platform
                .overwrites(&ticket.channel_id)
                .iter()
                .any(|o| o.target == crate::permissions::OverwriteTarget::Member(carol.clone()))
        );
    }

    #[tokio::test]
    async fn test_suggest_participants_filters_by_tag() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Report).await;
        desk.controller
            .add_participant(&desk.staff("bob"), &ticket.channel_id, &desk.user("carol"))
            .await
            .unwrap();

        let suggestions = desk
            .controller
            .suggest_participants(&ticket.channel_id, "CAR")
            .await
            .unwrap();
        let tags: Vec<_> = suggestions.iter().map(|m| m.tag.as_str()).collect();
        assert_eq!(tags, vec!["carol"]);
    }

    #[tokio::test]
    async fn test_suggest_participants_skips_bots() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Report).await;
        let helper = UserId::new("helper-bot");
        desk.platform.add_member(Member {
            bot: true,
            ..Member::new(helper.clone(), "helper-bot").with_roles(&["everyone"])
        });
        desk.controller
            .add_participant(&desk.staff("bob"), &ticket.channel_id, &helper)
            .await
            .unwrap();

        let suggestions = desk
            .controller
            .suggest_participants(&ticket.channel_id, "")
            .await
            .unwrap();
        assert!(!suggestions.is_empty());
        assert!(suggestions.iter().all(|m| !m.bot));
        assert!(suggestions.iter().any(|m| m.id == alice));
    }

    #[tokio::test]
    async fn test_suggest_participants_outside_ticket_is_empty() {
        let desk = TestDesk::new();
        let carol = desk.user("carol");
        let lounge = desk.platform.add_text_channel(
            "lounge",
            &desk.categories.report,
            vec![crate::permissions::Overwrite::member(
                carol,
                Permissions::VIEW_CHANNEL,
            )],
        );

        let suggestions = desk
            .controller
            .suggest_participants(&lounge, "car")
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_succeeds_when_owners_block_direct_messages() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let dave = desk.user("dave");
        let ticket = desk.open(&alice, CategoryType::Appeal).await;
        desk.platform.block_direct_messages(&alice);
        desk.platform.block_direct_messages(&dave);

        let outcome = desk
            .controller
            .transfer(&desk.staff("bob"), &ticket.channel_id, &dave)
            .await
            .unwrap();

        assert_eq!(outcome.value.owner_id, dave);
        assert!(outcome.warnings.is_empty());
        assert!(desk.platform.direct_messages(&alice).is_empty());
        assert!(desk.platform.direct_messages(&dave).is_empty());
        let stored = desk
            .controller
            .ledger()
            .snapshot("checking owner")
            .await
            .unwrap();
        assert_eq!(stored.document.get(&ticket.channel_id).unwrap().owner_id, dave);
    }

    #[tokio::test]
    async fn test_setup_panel_posts_three_buttons() {
        let desk = TestDesk::new();
        let lobby = desk.platform.add_category("Lobby", Vec::new());

        desk.controller
            .setup_panel(&desk.admin("root"), &lobby)
            .await
            .unwrap();
        let posted = desk.platform.posted(&lobby);
        let ids: Vec<_> = posted[0].components.iter().filter_map(Component::id).collect();
        assert_eq!(ids, vec!["report_ticket", "appeal_ticket", "inquiry_ticket"]);

        assert!(
            desk.controller
                .setup_panel(&desk.staff("bob"), &lobby)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_orphaned_tickets_reported() {
        let desk = TestDesk::new();
        let ticket = desk.open(&desk.user("alice"), CategoryType::Report).await;
        desk.platform
            .delete_channel(&ticket.channel_id)
            .await
            .unwrap();

        let orphans = desk.controller.orphaned_tickets().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].channel_id, ticket.channel_id);
        assert_eq!(desk.ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_transfer_moves_grant_and_notifies_both_owners() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let dave = desk.user("dave");
        let ticket = desk.open(&alice, CategoryType::Inquiry).await;

        let outcome = desk
            .controller
            .transfer(&desk.admin("carol"), &ticket.channel_id, &dave)
            .await
            .unwrap();

        assert_eq!(outcome.value.owner_id, dave);
        let members: Vec<_> = desk
            .platform
            .overwrites(&ticket.channel_id)
            .into_iter()
            .filter_map(|o| match o.target {
                crate::permissions::OverwriteTarget::Member(user) => Some(user),
                crate::permissions::OverwriteTarget::Role(_) => None,
            })
            .collect();
        assert_eq!(members, vec![dave.clone()]);
        assert_eq!(desk.platform.direct_messages(&alice).len(), 1);
        assert_eq!(desk.platform.direct_messages(&dave).len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_to_non_member_is_rejected() {
        let desk = TestDesk::new();
        let alice = desk.user("alice");
        let ticket = desk.open(&alice, CategoryType::Report).await;

        let err = desk
            .controller
            .transfer(&desk.staff("bob"), &ticket.channel_id, &UserId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeskError::PreconditionFailed(Precondition::NotAMember { .. })
        ));
        assert!(desk.platform.direct_messages(&alice).is_empty());
    }
}
