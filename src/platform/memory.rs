//! In-process platform used by the simulator and the test suite

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{
    ChannelDirectory, ChannelInfo, ChannelMessage, IdentityDirectory, Member, MessageHistory,
    OutboundMessage,
};
use crate::core::{ChannelId, RoleId, UserId};
use crate::error::{DeskError, Result};
use crate::permissions::{Overwrite, OverwriteTarget};

/// Identity used as the author of messages the engine posts
pub const BOT_USER_ID: &str = "bot";

/// A channel or category held by [`MemoryPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChannel {
    pub id: ChannelId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
    pub topic: String,
    pub is_category: bool,
    pub overwrites: Vec<Overwrite>,
    pub history: Vec<ChannelMessage>,
    pub posted: Vec<OutboundMessage>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    channels: HashMap<ChannelId, MemoryChannel>,
    deleted: Vec<ChannelId>,
    members: HashMap<UserId, Member>,
    direct_messages: Vec<(UserId, OutboundMessage)>,
    dms_blocked: HashSet<UserId>,
    fail_overwrites: bool,
    fail_history: bool,
}

/// Host platform kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn allocate_id(state: &mut State) -> ChannelId {
        state.next_id += 1;
        ChannelId::new(format!("{}", 1_000_000 + state.next_id))
    }

    /// Register a category with its template overwrites
    pub fn add_category(&self, name: &str, overwrites: Vec<Overwrite>) -> ChannelId {
        let mut state = self.state();
        let id = Self::allocate_id(&mut state);
        self.insert_channel(&mut state, id.clone(), name, None, true, overwrites);
        id
    }

    /// Register a category under a fixed identifier
    pub fn add_category_with_id(&self, id: &ChannelId, name: &str, overwrites: Vec<Overwrite>) {
        let mut state = self.state();
        self.insert_channel(&mut state, id.clone(), name, None, true, overwrites);
    }

    /// Register a text channel
    pub fn add_text_channel(
        &self,
        name: &str,
        parent_id: &ChannelId,
        overwrites: Vec<Overwrite>,
    ) -> ChannelId {
        let mut state = self.state();
        let id = Self::allocate_id(&mut state);
        self.insert_channel(
            &mut state,
            id.clone(),
            name,
            Some(parent_id.clone()),
            false,
            overwrites,
        );
        id
    }

    #[allow(clippy::unused_self)]
    fn insert_channel(
        &self,
        state: &mut State,
        id: ChannelId,
        name: &str,
        parent_id: Option<ChannelId>,
        is_category: bool,
        overwrites: Vec<Overwrite>,
    ) {
        state.channels.insert(
            id.clone(),
            MemoryChannel {
                id,
                name: name.to_string(),
                parent_id,
                topic: String::new(),
                is_category,
                overwrites,
                history: Vec::new(),
                posted: Vec::new(),
            },
        );
    }

    pub fn add_member(&self, member: Member) {
        self.state().members.insert(member.id.clone(), member);
    }

    pub fn remove_member(&self, user_id: &UserId) {
        self.state().members.remove(user_id);
    }

    /// Make direct messages to this user fail
    pub fn block_direct_messages(&self, user_id: &UserId) {
        self.state().dms_blocked.insert(user_id.clone());
    }

    /// Make every overwrite edit fail
    pub fn set_fail_overwrites(&self, fail: bool) {
        self.state().fail_overwrites = fail;
    }

    /// Make history reads fail
    pub fn set_fail_history(&self, fail: bool) {
        self.state().fail_history = fail;
    }

    /// Append a message to a channel's history
    pub fn push_message(&self, channel_id: &ChannelId, message: ChannelMessage) {
        if let Some(channel) = self.state().channels.get_mut(channel_id) {
            channel.history.push(message);
        }
    }

    #[must_use]
    pub fn channel_snapshot(&self, channel_id: &ChannelId) -> Option<MemoryChannel> {
        self.state().channels.get(channel_id).cloned()
    }

    #[must_use]
    pub fn exists(&self, channel_id: &ChannelId) -> bool {
        self.state().channels.contains_key(channel_id)
    }

    #[must_use]
    pub fn overwrites(&self, channel_id: &ChannelId) -> Vec<Overwrite> {
        self.state()
            .channels
            .get(channel_id)
            .map(|c| c.overwrites.clone())
            .unwrap_or_default()
    }

    /// Messages the engine posted to a channel
    #[must_use]
    pub fn posted(&self, channel_id: &ChannelId) -> Vec<OutboundMessage> {
        self.state()
            .channels
            .get(channel_id)
            .map(|c| c.posted.clone())
            .unwrap_or_default()
    }

    /// Direct messages delivered to a user
    #[must_use]
    pub fn direct_messages(&self, user_id: &UserId) -> Vec<OutboundMessage> {
        self.state()
            .direct_messages
            .iter()
            .filter(|(to, _)| to == user_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Channels deleted so far, in order
    #[must_use]
    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.state().deleted.clone()
    }

    /// Non-category channels, ordered by id
    #[must_use]
    pub fn text_channels(&self) -> Vec<ChannelId> {
        let mut ids: Vec<_> = self
            .state()
            .channels
            .values()
            .filter(|c| !c.is_category)
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn with_channel<T>(
        &self,
        channel_id: &ChannelId,
        f: impl FnOnce(&mut MemoryChannel) -> T,
    ) -> Result<T> {
        let mut state = self.state();
        state
            .channels
            .get_mut(channel_id)
            .map(f)
            .ok_or_else(|| DeskError::platform(format!("Unknown channel {channel_id}")))
    }

    fn with_overwrites<T>(
        &self,
        channel_id: &ChannelId,
        f: impl FnOnce(&mut Vec<Overwrite>) -> T,
    ) -> Result<T> {
        if self.state().fail_overwrites {
            return Err(DeskError::platform("Missing permissions"));
        }
        self.with_channel(channel_id, |c| f(&mut c.overwrites))
    }
}

#[async_trait]
impl ChannelDirectory for MemoryPlatform {
    async fn create_channel(
        &self,
        name: &str,
        parent_id: &ChannelId,
        topic: &str,
    ) -> Result<ChannelInfo> {
        let mut state = self.state();
        if !state.channels.contains_key(parent_id) {
            return Err(DeskError::platform(format!("Unknown category {parent_id}")));
        }
        let id = Self::allocate_id(&mut state);
        self.insert_channel(
            &mut state,
            id.clone(),
            name,
            Some(parent_id.clone()),
            false,
            Vec::new(),
        );
        if let Some(channel) = state.channels.get_mut(&id) {
            channel.topic = topic.to_string();
        }
        Ok(ChannelInfo {
            id,
            name: name.to_string(),
            parent_id: Some(parent_id.clone()),
        })
    }

    async fn channel(&self, channel_id: &ChannelId) -> Result<Option<ChannelInfo>> {
        Ok(self.state().channels.get(channel_id).map(|c| ChannelInfo {
            id: c.id.clone(),
            name: c.name.clone(),
            parent_id: c.parent_id.clone(),
        }))
    }

    async fn rename_channel(&self, channel_id: &ChannelId, name: &str) -> Result<()> {
        self.with_channel(channel_id, |c| c.name = name.to_string())
    }

    async fn reparent_channel(&self, channel_id: &ChannelId, parent_id: &ChannelId) -> Result<()> {
        if !self.exists(parent_id) {
            return Err(DeskError::platform(format!("Unknown category {parent_id}")));
        }
        self.with_channel(channel_id, |c| c.parent_id = Some(parent_id.clone()))
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<()> {
        let mut state = self.state();
        if state.channels.remove(channel_id).is_none() {
            return Err(DeskError::platform(format!("Unknown channel {channel_id}")));
        }
        state.deleted.push(channel_id.clone());
        Ok(())
    }

    async fn list_children(&self, parent_id: &ChannelId) -> Result<Vec<ChannelId>> {
        let mut children: Vec<_> = self
            .state()
            .channels
            .values()
            .filter(|c| c.parent_id.as_ref() == Some(parent_id))
            .map(|c| c.id.clone())
            .collect();
        children.sort();
        Ok(children)
    }

    async fn list_members(&self, channel_id: &ChannelId) -> Result<Vec<UserId>> {
        self.with_channel(channel_id, |c| {
            c.overwrites
                .iter()
                .filter_map(|o| match &o.target {
                    OverwriteTarget::Member(user_id) => Some(user_id.clone()),
                    OverwriteTarget::Role(_) => None,
                })
                .collect()
        })
    }

    async fn get_overwrites(&self, channel_id: &ChannelId) -> Result<Vec<Overwrite>> {
        self.with_channel(channel_id, |c| c.overwrites.clone())
    }

    async fn set_overwrites(
        &self,
        channel_id: &ChannelId,
        overwrites: Vec<Overwrite>,
    ) -> Result<()> {
        self.with_overwrites(channel_id, |current| *current = overwrites)
    }

    async fn edit_overwrite(&self, channel_id: &ChannelId, overwrite: Overwrite) -> Result<()> {
        self.with_overwrites(channel_id, |current| {
            match current.iter_mut().find(|o| o.target == overwrite.target) {
                Some(existing) => *existing = overwrite,
                None => current.push(overwrite),
            }
        })
    }

    async fn remove_overwrite(
        &self,
        channel_id: &ChannelId,
        target: &OverwriteTarget,
    ) -> Result<()> {
        self.with_overwrites(channel_id, |current| current.retain(|o| &o.target != target))
    }

    async fn post_message(&self, channel_id: &ChannelId, message: OutboundMessage) -> Result<()> {
        self.with_channel(channel_id, |c| {
            let id = format!("{}-{}", c.id, c.history.len() + 1);
            c.history.push(ChannelMessage {
                id,
                author_id: UserId::new(BOT_USER_ID),
                author_tag: "Tickets".to_string(),
                content: message.content.clone(),
                attachments: Vec::new(),
                timestamp: Utc::now(),
            });
            c.posted.push(message);
        })
    }
}

#[async_trait]
impl IdentityDirectory for MemoryPlatform {
    async fn fetch_member(&self, user_id: &UserId) -> Result<Option<Member>> {
        Ok(self.state().members.get(user_id).cloned())
    }

    async fn send_direct_message(&self, user_id: &UserId, message: OutboundMessage) -> Result<()> {
        let mut state = self.state();
        if state.dms_blocked.contains(user_id) {
            return Err(DeskError::NotificationFailed(format!(
                "Cannot send messages to user {user_id}"
            )));
        }
        state.direct_messages.push((user_id.clone(), message));
        Ok(())
    }

    async fn add_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        let mut state = self.state();
        let member = state
            .members
            .get_mut(user_id)
            .ok_or_else(|| DeskError::platform(format!("Unknown member {user_id}")))?;
        if !member.roles.contains(role_id) {
            member.roles.push(role_id.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHistory for MemoryPlatform {
    async fn recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        if self.state().fail_history {
            return Err(DeskError::platform("Missing access to message history"));
        }
        self.with_channel(channel_id, |c| {
            c.history.iter().rev().take(limit).cloned().collect()
        })
    }
}
