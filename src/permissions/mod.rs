//! Channel access control
//!
//! A ticket channel's overwrite set is derived from its category's overwrites
//! (the template) plus explicit grants for the owner, the claimer and any
//! added participants.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::sync::Arc;
use tracing::debug;

use crate::core::{ChannelId, RoleId, UserId};
use crate::error::Result;
use crate::platform::ChannelDirectory;

/// Capability bitset, using the host platform's bit positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const ATTACH_FILES: Self = Self(1 << 15);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const MANAGE_ROLES: Self = Self(1 << 28);

    /// Grant given to a ticket's owner
    pub const OWNER_GRANT: Self =
        Self(Self::VIEW_CHANNEL.0 | Self::SEND_MESSAGES.0 | Self::ATTACH_FILES.0);
    /// Grant given to the staff member who claimed a ticket
    pub const CLAIMER_GRANT: Self = Self(Self::VIEW_CHANNEL.0 | Self::SEND_MESSAGES.0);
    /// Grant given to a participant added to a ticket
    pub const PARTICIPANT_GRANT: Self = Self(
        Self::VIEW_CHANNEL.0
            | Self::SEND_MESSAGES.0
            | Self::ATTACH_FILES.0
            | Self::READ_MESSAGE_HISTORY.0,
    );

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Who an overwrite applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

/// A single channel permission overwrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl Overwrite {
    /// Allow-only overwrite for a member
    #[must_use]
    pub const fn member(user_id: UserId, allow: Permissions) -> Self {
        Self {
            target: OverwriteTarget::Member(user_id),
            allow,
            deny: Permissions::NONE,
        }
    }

    /// Overwrite for a role
    #[must_use]
    pub const fn role(role_id: RoleId, allow: Permissions, deny: Permissions) -> Self {
        Self {
            target: OverwriteTarget::Role(role_id),
            allow,
            deny,
        }
    }
}

/// Overwrite set for a ticket channel: every template entry, with the owner
/// granted view, send and attach on top
///
/// Applying the result twice gives the same set.
#[must_use]
pub fn overwrites_from_template(template: &[Overwrite], owner_id: &UserId) -> Vec<Overwrite> {
    let owner_target = OverwriteTarget::Member(owner_id.clone());
    let mut overwrites = template.to_vec();

    match overwrites.iter_mut().find(|o| o.target == owner_target) {
        Some(existing) => {
            existing.allow = existing.allow | Permissions::OWNER_GRANT;
            existing.deny = existing.deny.difference(Permissions::OWNER_GRANT);
        },
        None => overwrites.push(Overwrite::member(owner_id.clone(), Permissions::OWNER_GRANT)),
    }
    overwrites
}

/// Applies overwrite sets to live channels
#[derive(Clone)]
pub struct PermissionSynchronizer {
    channels: Arc<dyn ChannelDirectory>,
}

impl PermissionSynchronizer {
    pub fn new(channels: Arc<dyn ChannelDirectory>) -> Self {
        Self { channels }
    }

    /// Replace the channel's overwrites with the category template plus the
    /// owner grant
    ///
    /// Any overwrite not derivable from those two sources is dropped.
    pub async fn sync_from_category(
        &self,
        channel_id: &ChannelId,
        category_id: &ChannelId,
        owner_id: &UserId,
    ) -> Result<Vec<Overwrite>> {
        let template = self.channels.get_overwrites(category_id).await?;
        let overwrites = overwrites_from_template(&template, owner_id);
        debug!(
            channel = %channel_id,
            category = %category_id,
            entries = overwrites.len(),
            "Syncing ticket permissions from category"
        );
        self.channels
            .set_overwrites(channel_id, overwrites.clone())
            .await?;
        Ok(overwrites)
    }

    /// Add or replace a single member's overwrite
    pub async fn grant(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
        capabilities: Permissions,
    ) -> Result<()> {
        self.channels
            .edit_overwrite(channel_id, Overwrite::member(user_id.clone(), capabilities))
            .await
    }

    /// Remove a single member's overwrite
    pub async fn revoke(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<()> {
        self.channels
            .remove_overwrite(channel_id, &OverwriteTarget::Member(user_id.clone()))
            .await
    }
}
