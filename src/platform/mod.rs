//! Host chat-platform boundary
//!
//! The lifecycle engine only talks to the platform through these traits.
//! Gateway delivery, command registration and embed formatting live on the
//! other side of them.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ChannelId, RoleId, UserId};
use crate::error::Result;
use crate::permissions::{Overwrite, OverwriteTarget, Permissions};

pub use memory::{MemoryChannel, MemoryPlatform};

/// A server member as seen by authorization checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    /// Display tag, e.g. `name#0001` or a unique username
    pub tag: String,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    pub fn new(id: impl Into<UserId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            roles: Vec::new(),
            permissions: Permissions::NONE,
            bot: false,
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| RoleId::new(*r)).collect();
        self
    }

    #[must_use]
    pub const fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.permissions.contains(Permissions::ADMINISTRATOR)
    }

    /// Administrators hold every capability
    #[must_use]
    pub const fn has_permission(&self, permission: Permissions) -> bool {
        self.is_admin() || self.permissions.contains(permission)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[RoleId]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

/// A channel as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
}

/// Visual style of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// One choice in a selection menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// Interactive affordance attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Button {
        id: String,
        label: String,
        style: ButtonStyle,
    },
    Link {
        label: String,
        url: String,
    },
    Select {
        id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
}

impl Component {
    pub fn button(id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self::Button {
            id: id.into(),
            label: label.into(),
            style,
        }
    }

    /// Component id, if it has one
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Button { id, .. } | Self::Select { id, .. } => Some(id),
            Self::Link { .. } => None,
        }
    }
}

/// A message the engine sends to a channel or user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    /// Labelled summary fields, rendered as an embed by the transport
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }
}

/// A message read back from channel history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub author_id: UserId,
    pub author_tag: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Channel management on the host platform
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn create_channel(
        &self,
        name: &str,
        parent_id: &ChannelId,
        topic: &str,
    ) -> Result<ChannelInfo>;

    async fn channel(&self, channel_id: &ChannelId) -> Result<Option<ChannelInfo>>;

    async fn rename_channel(&self, channel_id: &ChannelId, name: &str) -> Result<()>;

    async fn reparent_channel(&self, channel_id: &ChannelId, parent_id: &ChannelId) -> Result<()>;

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<()>;

    /// Channels nested under a category
    async fn list_children(&self, parent_id: &ChannelId) -> Result<Vec<ChannelId>>;

    /// Members holding an explicit overwrite on the channel
    async fn list_members(&self, channel_id: &ChannelId) -> Result<Vec<UserId>>;

    async fn get_overwrites(&self, channel_id: &ChannelId) -> Result<Vec<Overwrite>>;

    async fn set_overwrites(&self, channel_id: &ChannelId, overwrites: Vec<Overwrite>)
    -> Result<()>;

    async fn edit_overwrite(&self, channel_id: &ChannelId, overwrite: Overwrite) -> Result<()>;

    async fn remove_overwrite(&self, channel_id: &ChannelId, target: &OverwriteTarget)
    -> Result<()>;

    async fn post_message(&self, channel_id: &ChannelId, message: OutboundMessage) -> Result<()>;
}

/// Member lookup and direct messaging
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// `None` when the user is not a member of the server
    async fn fetch_member(&self, user_id: &UserId) -> Result<Option<Member>>;

    async fn send_direct_message(&self, user_id: &UserId, message: OutboundMessage) -> Result<()>;

    async fn add_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()>;
}

/// Read access to channel history
#[async_trait]
pub trait MessageHistory: Send + Sync {
    /// Up to `limit` most recent messages, newest first
    async fn recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>>;
}
