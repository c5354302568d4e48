//! Lifecycle event bus
//!
//! Every successful lifecycle transition is announced here so the operator
//! CLI, the simulator and any other in-process listener can follow along
//! without the controller knowing about them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::{CategoryType, ChannelId, UserId};

const DEFAULT_CAPACITY: usize = 100;

/// A completed lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created {
        channel_id: ChannelId,
        owner_id: UserId,
        category: CategoryType,
        ticket_number: u32,
    },
    Claimed {
        channel_id: ChannelId,
        claimer_id: UserId,
    },
    Transferred {
        channel_id: ChannelId,
        from: UserId,
        to: UserId,
    },
    Renamed {
        channel_id: ChannelId,
        name: String,
    },
    Moved {
        channel_id: ChannelId,
        from: Option<ChannelId>,
        to: ChannelId,
    },
    ParticipantAdded {
        channel_id: ChannelId,
        user_id: UserId,
    },
    ParticipantRemoved {
        channel_id: ChannelId,
        user_id: UserId,
    },
    Closed {
        channel_id: ChannelId,
        closed_by: UserId,
        closed_at: DateTime<Utc>,
        transcript_url: Option<String>,
    },
}

impl LifecycleEvent {
    /// Channel the event concerns
    #[must_use]
    pub const fn channel_id(&self) -> &ChannelId {
        match self {
            Self::Created { channel_id, .. }
            | Self::Claimed { channel_id, .. }
            | Self::Transferred { channel_id, .. }
            | Self::Renamed { channel_id, .. }
            | Self::Moved { channel_id, .. }
            | Self::ParticipantAdded { channel_id, .. }
            | Self::ParticipantRemoved { channel_id, .. }
            | Self::Closed { channel_id, .. } => channel_id,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Claimed { .. } => "claimed",
            Self::Transferred { .. } => "transferred",
            Self::Renamed { .. } => "renamed",
            Self::Moved { .. } => "moved",
            Self::ParticipantAdded { .. } => "participant_added",
            Self::ParticipantRemoved { .. } => "participant_removed",
            Self::Closed { .. } => "closed",
        }
    }
}

/// Broadcasts lifecycle events to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per slow subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Get an event receiver
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Announce a transition; having no subscribers is not an error
    pub fn publish(&self, event: LifecycleEvent) {
        tracing::debug!(
            event = event.name(),
            channel = %event.channel_id(),
            "Lifecycle event"
        );
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();

        bus.publish(LifecycleEvent::Claimed {
            channel_id: ChannelId::new("c1"),
            claimer_id: UserId::new("staff"),
        });

        let event = receiver.recv().await.expect("Failed to receive event");
        assert_eq!(event.name(), "claimed");
        assert_eq!(event.channel_id().as_str(), "c1");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(LifecycleEvent::Renamed {
            channel_id: ChannelId::new("c1"),
            name: "ticket-billing".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LifecycleEvent::Transferred {
            channel_id: ChannelId::new("c1"),
            from: UserId::new("a"),
            to: UserId::new("d"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "transferred");
        assert_eq!(json["to"], "d");
    }
}
