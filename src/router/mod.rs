//! Inbound action routing
//!
//! Maps slash commands, button presses and menu selections onto lifecycle
//! operations and turns their results into replies. Every failure becomes a
//! reply visible only to the actor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{ChannelId, UserId};
use crate::error::{DeskError, Result};
use crate::lifecycle::{
    CLAIM_BUTTON_ID, CLOSE_CANCEL_ID, CLOSE_REQUEST_ID, CloseOutcome, LifecycleController,
    MOVE_MENU_ID, parse_close_confirm_id, parse_panel_button_id,
};
use crate::platform::{Component, OutboundMessage, SelectOption};

/// An event delivered by the host platform's gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundAction {
    CommandInvoked {
        name: String,
        #[serde(default)]
        args: HashMap<String, String>,
        actor: UserId,
        channel: ChannelId,
    },
    ButtonPressed {
        id: String,
        actor: UserId,
        channel: ChannelId,
    },
    MenuSelected {
        id: String,
        value: String,
        actor: UserId,
        channel: ChannelId,
    },
}

impl InboundAction {
    #[must_use]
    pub const fn actor(&self) -> &UserId {
        match self {
            Self::CommandInvoked { actor, .. }
            | Self::ButtonPressed { actor, .. }
            | Self::MenuSelected { actor, .. } => actor,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        match self {
            Self::CommandInvoked { channel, .. }
            | Self::ButtonPressed { channel, .. }
            | Self::MenuSelected { channel, .. } => channel,
        }
    }
}

/// Response to an inbound action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub message: OutboundMessage,
    /// Only the actor can see the reply
    pub ephemeral: bool,
}

impl Reply {
    #[must_use]
    pub const fn public(message: OutboundMessage) -> Self {
        Self {
            message,
            ephemeral: false,
        }
    }

    #[must_use]
    pub const fn private(message: OutboundMessage) -> Self {
        Self {
            message,
            ephemeral: true,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Dispatches inbound actions to the lifecycle controller
#[derive(Debug, Clone)]
pub struct Router {
    controller: Arc<LifecycleController>,
}

impl Router {
    pub const fn new(controller: Arc<LifecycleController>) -> Self {
        Self { controller }
    }

    #[must_use]
    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    /// Handle one action; never fails
    pub async fn dispatch(&self, action: &InboundAction) -> Reply {
        match self.route(action).await {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_rejection() {
                    debug!(actor = %action.actor(), error = %e, "Request rejected");
                } else {
                    warn!(actor = %action.actor(), channel = %action.channel(), error = %e, "Request failed");
                }
                Reply::private(OutboundMessage::text(e.user_message()))
            },
        }
    }

    /// Choices for the remove-user autocomplete
    pub async fn autocomplete(&self, channel: &ChannelId, query: &str) -> Result<Vec<SelectOption>> {
        Ok(self
            .controller
            .suggest_participants(channel, query)
            .await?
            .into_iter()
            .map(|member| SelectOption {
                label: member.tag,
                value: member.id.to_string(),
            })
            .collect())
    }

    async fn route(&self, action: &InboundAction) -> Result<Reply> {
        match action {
            InboundAction::CommandInvoked {
                name,
                args,
                actor,
                channel,
            } => self.command(name, args, actor, channel).await,
            InboundAction::ButtonPressed { id, actor, channel } => {
                self.button(id, actor, channel).await
            },
            InboundAction::MenuSelected {
                id,
                value,
                actor,
                channel,
            } => self.menu(id, value, actor, channel).await,
        }
    }

    async fn command(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        actor: &UserId,
        channel: &ChannelId,
    ) -> Result<Reply> {
        let controller = &self.controller;
        match name {
            "setup" => {
                controller.setup_panel(actor, channel).await?;
                Ok(Reply::private(OutboundMessage::text("Ticket panel posted.")))
            },
            "close" => Ok(Reply::public(controller.request_close(actor, channel).await?)),
            "claim" => self.claim(actor, channel).await,
            "rename" => {
                let requested = required(args, "name")?;
                let outcome = controller.rename(actor, channel, requested).await?;
                let shown = outcome.value.custom_name.unwrap_or_default();
                Ok(Reply::public(with_warnings(
                    OutboundMessage::text(format!("Ticket renamed to {shown}.")),
                    &outcome.warnings,
                )))
            },
            "add" => {
                let user = UserId::new(required(args, "user")?);
                let outcome = controller.add_participant(actor, channel, &user).await?;
                Ok(Reply::public(with_warnings(
                    OutboundMessage::text(format!("Added {} to the ticket.", user.mention())),
                    &outcome.warnings,
                )))
            },
            "remove" => {
                let user = UserId::new(required(args, "user")?);
                let outcome = controller.remove_participant(actor, channel, &user).await?;
                Ok(Reply::public(with_warnings(
                    OutboundMessage::text(format!("Removed {} from the ticket.", user.mention())),
                    &outcome.warnings,
                )))
            },
            "transfer" => {
                let user = UserId::new(required(args, "user")?);
                let outcome = controller.transfer(actor, channel, &user).await?;
                Ok(Reply::public(with_warnings(
                    OutboundMessage::text(format!(
                        "Ticket ownership transferred to {}.",
                        user.mention()
                    )),
                    &outcome.warnings,
                )))
            },
            "move" => Ok(Reply::private(controller.move_menu(actor, channel).await?)),
            "appeal" => {
                let subcommand = args.get("subcommand").map_or("blacklist", String::as_str);
                if subcommand != "blacklist" {
                    return Err(DeskError::InvalidInput(format!(
                        "Unknown appeal subcommand: {subcommand}"
                    )));
                }
                let user = UserId::new(required(args, "user")?);
                let reason = required(args, "reason")?;
                let outcome = controller.blacklist_appeal(actor, &user, reason).await?;
                Ok(Reply::public(with_warnings(
                    OutboundMessage::text(format!(
                        "Successfully blacklisted {} for: {reason}",
                        outcome.value.tag
                    )),
                    &outcome.warnings,
                )))
            },
            other => Err(DeskError::InvalidInput(format!("Unknown command: {other}"))),
        }
    }

    async fn button(&self, id: &str, actor: &UserId, channel: &ChannelId) -> Result<Reply> {
        let controller = &self.controller;

        if let Some(category) = parse_panel_button_id(id) {
            let outcome = controller.create(actor, category).await?;
            return Ok(Reply::private(with_warnings(
                OutboundMessage::text(format!(
                    "Your ticket has been created: {}",
                    outcome.value.channel_id.mention()
                )),
                &outcome.warnings,
            )));
        }
        if id == CLAIM_BUTTON_ID {
            return self.claim(actor, channel).await;
        }
        if id == CLOSE_REQUEST_ID {
            return Ok(Reply::public(controller.request_close(actor, channel).await?));
        }
        if id == CLOSE_CANCEL_ID {
            controller.confirm_close(actor, channel, None, false).await?;
            return Ok(Reply::public(OutboundMessage::text("Ticket close cancelled.")));
        }
        if let Some(issued_at) = parse_close_confirm_id(id) {
            let outcome = controller
                .confirm_close(actor, channel, Some(issued_at), true)
                .await?;
            let mut message = OutboundMessage::text("Ticket closed.");
            let transcript_url = match &outcome.value {
                CloseOutcome::Closed(closed) => closed.transcript.url.clone(),
                CloseOutcome::Cancelled => None,
            };
            if let Some(url) = transcript_url {
                message = message.component(Component::Link {
                    label: "Transcript".to_string(),
                    url,
                });
            }
            return Ok(Reply::public(with_warnings(message, &outcome.warnings)));
        }

        Err(DeskError::InvalidInput(format!("Unknown button: {id}")))
    }

    async fn menu(
        &self,
        id: &str,
        value: &str,
        actor: &UserId,
        channel: &ChannelId,
    ) -> Result<Reply> {
        if id != MOVE_MENU_ID {
            return Err(DeskError::InvalidInput(format!("Unknown menu: {id}")));
        }
        let target = ChannelId::new(value);
        let outcome = self.controller.move_to(actor, channel, &target).await?;
        let category = self
            .controller
            .settings()
            .categories
            .category_of(&target)
            .map_or_else(|| target.to_string(), |c| c.to_string());
        Ok(Reply::public(with_warnings(
            OutboundMessage::text(format!("Ticket moved to {category}.")),
            &outcome.warnings,
        )))
    }

    async fn claim(&self, actor: &UserId, channel: &ChannelId) -> Result<Reply> {
        let outcome = self.controller.claim(actor, channel).await?;
        Ok(Reply::public(with_warnings(
            OutboundMessage::text(format!("Ticket claimed by {}.", actor.mention())),
            &outcome.warnings,
        )))
    }
}

fn required<'a>(args: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    args.get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| DeskError::InvalidInput(format!("Missing option: {name}")))
}

fn with_warnings(message: OutboundMessage, warnings: &[String]) -> OutboundMessage {
    if warnings.is_empty() {
        return message;
    }
    message.field("Warnings", warnings.join("\n"))
}
