//! Handler for `simulate`
//!
//! Replays a YAML script of inbound actions through the router against an
//! in-memory server, store and publisher. Two placeholders let scripts refer
//! to things only known at run time: the channel `$latest` is the most
//! recently created ticket, and the button id `close:yes` is the confirm
//! button of the most recent close prompt.
//!
//! A script may seed the store with a ticket document left behind by an
//! earlier process. Numbering resumes from it, and its records whose channel
//! does not exist on the fresh server are reported as orphans.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::cli::OutputFormatter;
use crate::core::{ChannelId, RoleId};
use crate::error::{DeskError, Result};
use crate::integration::LifecycleEvent;
use crate::lifecycle::{
    AuthorizationPolicy, CLOSE_CONFIRM_PREFIX, CategoryMap, LifecycleController, LifecycleSettings,
    ManualScheduler, PlatformHandles,
};
use crate::permissions::{Overwrite, Permissions};
use crate::platform::{Member, MemoryPlatform};
use crate::router::{InboundAction, Reply, Router};
use crate::storage::{MemoryStore, TicketLedger};
use crate::transcript::{MemoryPublisher, TranscriptArchiver};

const EVERYONE_ROLE: &str = "everyone";
const DEFAULT_STAFF_ROLE: &str = "staff";
const LATEST_TICKET: &str = "$latest";
const CONFIRM_PLACEHOLDER: &str = "close:yes";

/// A scripted session
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationScript {
    /// Roles treated as staff; `staff` when omitted
    #[serde(default)]
    pub staff_roles: Vec<String>,
    #[serde(default)]
    pub blacklist_role: Option<String>,
    /// Ticket document the store starts with
    #[serde(default)]
    pub store: Option<serde_json::Value>,
    pub members: Vec<ScriptMember>,
    pub steps: Vec<InboundAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptMember {
    pub id: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub administrator: bool,
    #[serde(default)]
    pub manage_channels: bool,
}

impl ScriptMember {
    fn to_member(&self) -> Member {
        let mut roles = vec![RoleId::new(EVERYONE_ROLE)];
        roles.extend(self.roles.iter().map(RoleId::new));
        let mut permissions = Permissions::NONE;
        if self.administrator {
            permissions = permissions | Permissions::ADMINISTRATOR;
        }
        if self.manage_channels {
            permissions = permissions | Permissions::MANAGE_CHANNELS;
        }
        let mut member = Member::new(self.id.as_str(), self.tag.as_deref().unwrap_or(&self.id))
            .with_permissions(permissions);
        member.roles = roles;
        member
    }
}

/// What one step produced
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub actor: String,
    pub channel: String,
    pub reply: Reply,
    pub events: Vec<LifecycleEvent>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub steps: Vec<StepReport>,
    pub open_tickets: usize,
    pub deleted_channels: Vec<ChannelId>,
    pub transcripts: usize,
    pub orphaned_tickets: Vec<ChannelId>,
}

/// Run `script` against a fresh in-memory server
pub async fn run_simulation(script: &SimulationScript) -> Result<SimulationReport> {
    let run_id = Uuid::new_v4();
    let span = info_span!("simulation", %run_id);
    async move {
        let mut world = World::build(script)?;
        world.router.controller().restore_sequence().await?;
        let mut steps = Vec::with_capacity(script.steps.len());
        for (index, action) in script.steps.iter().enumerate() {
            let action = world.resolve(action);
            let reply = world.router.dispatch(&action).await;
            world.remember_prompt(&reply);
            let events = world.drain_events();
            steps.push(StepReport {
                step: index + 1,
                actor: action.actor().to_string(),
                channel: action.channel().to_string(),
                reply,
                events,
            });
        }

        let delay = world.router.controller().settings().channel_delete_delay;
        let deleted = world.scheduler.advance(delay).await;
        let orphaned_tickets = world
            .router
            .controller()
            .orphaned_tickets()
            .await?
            .into_iter()
            .map(|ticket| ticket.channel_id)
            .collect();
        info!(steps = steps.len(), deleted, "Simulation finished");

        Ok(SimulationReport {
            run_id,
            steps,
            open_tickets: world
                .router
                .controller()
                .ledger()
                .snapshot("summarizing the simulation")
                .await?
                .document
                .len(),
            deleted_channels: world.platform.deleted_channels(),
            transcripts: world.publisher.len(),
            orphaned_tickets,
        })
    }
    .instrument(span)
    .await
}

/// Load a script file and print what each step did
///
/// # Errors
///
/// Returns an error if the script cannot be read or parsed. Failed steps are
/// part of the report, not errors.
pub async fn handle_simulate(script_path: &Path, output: &OutputFormatter) -> Result<()> {
    let raw = tokio::fs::read_to_string(script_path).await.map_err(|e| {
        DeskError::InvalidInput(format!(
            "Cannot read script {}: {e}",
            script_path.display()
        ))
    })?;
    let script: SimulationScript = serde_yaml::from_str(&raw)?;
    let report = run_simulation(&script).await?;

    if output.is_json() {
        return output.print_json(&report);
    }

    for step in &report.steps {
        output.heading(&format!(
            "[{}] {} in {}",
            step.step, step.actor, step.channel
        ));
        let visibility = if step.reply.ephemeral { " (private)" } else { "" };
        output.info(&format!("  {}{visibility}", step.reply.content()));
        for (name, value) in &step.reply.message.fields {
            output.field(name, value);
        }
        for event in &step.events {
            output.info(&format!("  -> {} {}", event.name(), event.channel_id()));
        }
    }
    output.info("");
    for channel in &report.orphaned_tickets {
        output.warning(&format!("Ticket {channel} has no live channel"));
    }
    output.success(&format!(
        "{} step(s), {} open ticket(s), {} channel(s) deleted, {} transcript(s)",
        report.steps.len(),
        report.open_tickets,
        report.deleted_channels.len(),
        report.transcripts
    ));
    Ok(())
}

/// The in-memory server a script runs against
struct World {
    platform: Arc<MemoryPlatform>,
    publisher: Arc<MemoryPublisher>,
    scheduler: Arc<ManualScheduler>,
    router: Router,
    events: Receiver<LifecycleEvent>,
    named: HashMap<String, ChannelId>,
    latest_ticket: Option<ChannelId>,
    confirm_id: Option<String>,
}

impl World {
    fn build(script: &SimulationScript) -> Result<Self> {
        let staff_roles: Vec<RoleId> = if script.staff_roles.is_empty() {
            vec![RoleId::new(DEFAULT_STAFF_ROLE)]
        } else {
            script.staff_roles.iter().map(RoleId::new).collect()
        };

        let platform = Arc::new(MemoryPlatform::new());
        let template = category_template(&staff_roles);
        let mut named = HashMap::new();
        let reports = platform.add_category("Reports", template.clone());
        let appeals = platform.add_category("Appeals", template.clone());
        let inquiries = platform.add_category("Inquiries", template);
        let staff_area = platform.add_category("Staff", Vec::new());
        let log_channel = platform.add_text_channel("ticket-logs", &staff_area, Vec::new());
        let lobby = platform.add_text_channel("lobby", &staff_area, Vec::new());
        named.insert("reports".to_string(), reports.clone());
        named.insert("appeals".to_string(), appeals.clone());
        named.insert("inquiries".to_string(), inquiries.clone());
        named.insert("ticket-logs".to_string(), log_channel.clone());
        named.insert("lobby".to_string(), lobby);

        for member in &script.members {
            platform.add_member(member.to_member());
        }

        let mut settings =
            LifecycleSettings::new(CategoryMap::new(reports, appeals, inquiries), log_channel);
        settings.appeal_blacklist_role = script.blacklist_role.as_deref().map(RoleId::new);

        let store = Arc::new(
            script
                .store
                .clone()
                .map_or_else(MemoryStore::new, MemoryStore::from_json),
        );
        let publisher = Arc::new(MemoryPublisher::new("memory://transcripts"));
        let scheduler = Arc::new(ManualScheduler::new());
        let controller = LifecycleController::new(
            TicketLedger::new(store, 3),
            PlatformHandles::from_platform(platform.clone()),
            TranscriptArchiver::new(publisher.clone())?,
            AuthorizationPolicy::new(staff_roles),
            settings,
        )
        .with_scheduler(scheduler.clone());
        let events = controller.events().subscribe();

        Ok(Self {
            platform,
            publisher,
            scheduler,
            router: Router::new(Arc::new(controller)),
            events,
            named,
            latest_ticket: None,
            confirm_id: None,
        })
    }

    fn channel(&self, raw: &ChannelId) -> ChannelId {
        if raw.as_str() == LATEST_TICKET {
            if let Some(latest) = &self.latest_ticket {
                return latest.clone();
            }
        }
        self.named.get(raw.as_str()).cloned().unwrap_or_else(|| raw.clone())
    }

    fn resolve(&self, action: &InboundAction) -> InboundAction {
        match action {
            InboundAction::CommandInvoked {
                name,
                args,
                actor,
                channel,
            } => InboundAction::CommandInvoked {
                name: name.clone(),
                args: args.clone(),
                actor: actor.clone(),
                channel: self.channel(channel),
            },
            InboundAction::ButtonPressed { id, actor, channel } => {
                let id = match (&self.confirm_id, id.as_str()) {
                    (Some(confirm), CONFIRM_PLACEHOLDER) => confirm.clone(),
                    _ => id.clone(),
                };
                InboundAction::ButtonPressed {
                    id,
                    actor: actor.clone(),
                    channel: self.channel(channel),
                }
            },
            InboundAction::MenuSelected {
                id,
                value,
                actor,
                channel,
            } => InboundAction::MenuSelected {
                id: id.clone(),
                value: self.channel(&ChannelId::new(value.as_str())).to_string(),
                actor: actor.clone(),
                channel: self.channel(channel),
            },
        }
    }

    fn remember_prompt(&mut self, reply: &Reply) {
        if let Some(id) = reply
            .message
            .components
            .iter()
            .filter_map(|component| component.id())
            .find(|id| id.starts_with(CLOSE_CONFIRM_PREFIX))
        {
            self.confirm_id = Some(id.to_string());
        }
    }

    fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let LifecycleEvent::Created { channel_id, .. } = &event {
                self.latest_ticket = Some(channel_id.clone());
            }
            drained.push(event);
        }
        drained
    }
}

fn category_template(staff_roles: &[RoleId]) -> Vec<Overwrite> {
    let mut template = vec![Overwrite::role(
        RoleId::new(EVERYONE_ROLE),
        Permissions::NONE,
        Permissions::VIEW_CHANNEL,
    )];
    template.extend(staff_roles.iter().map(|role| {
        Overwrite::role(
            role.clone(),
            Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            Permissions::NONE,
        )
    }));
    template
}
