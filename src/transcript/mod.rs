//! Transcript archival for closed tickets
//!
//! The archiver renders a ticket's recent history to HTML and hands it to a
//! [`TranscriptPublisher`]. Publishing never blocks a close: on failure the
//! caller gets a reference without a URL and the failure is logged.

mod publish;
mod render;

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::ChannelId;
use crate::error::{DeskError, Result};
use crate::platform::ChannelMessage;

pub use publish::{DirectoryPublisher, MemoryPublisher, TranscriptPublisher};
#[cfg(feature = "s3")]
pub use publish::S3Publisher;
pub use render::TranscriptRenderer;

/// Shown wherever a transcript link would go when publishing failed
pub const UNAVAILABLE_PLACEHOLDER: &str = "Transcript unavailable";

/// Where an archived transcript can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReference {
    /// Object key the transcript was published under
    pub key: String,
    /// Public URL, absent when publishing failed
    pub url: Option<String>,
}

impl ArtifactReference {
    #[must_use]
    pub const fn is_published(&self) -> bool {
        self.url.is_some()
    }

    /// The URL, or a placeholder when there is none
    #[must_use]
    pub fn locator(&self) -> &str {
        self.url.as_deref().unwrap_or(UNAVAILABLE_PLACEHOLDER)
    }
}

/// Object key for a channel's transcript
#[must_use]
pub fn transcript_key(channel_id: &ChannelId) -> String {
    format!("{channel_id}.html")
}

/// Renders and publishes transcripts
#[derive(Clone)]
pub struct TranscriptArchiver {
    renderer: TranscriptRenderer,
    publisher: Arc<dyn TranscriptPublisher>,
}

impl std::fmt::Debug for TranscriptArchiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptArchiver")
            .field("publisher", &"Arc<dyn TranscriptPublisher>")
            .finish()
    }
}

impl TranscriptArchiver {
    pub fn new(publisher: Arc<dyn TranscriptPublisher>) -> Result<Self> {
        Ok(Self {
            renderer: TranscriptRenderer::new()?,
            publisher,
        })
    }

    #[must_use]
    pub const fn renderer(&self) -> &TranscriptRenderer {
        &self.renderer
    }

    /// Render and publish, reporting failure to the caller
    pub async fn try_archive(
        &self,
        channel_id: &ChannelId,
        channel_name: &str,
        messages: &[ChannelMessage],
    ) -> Result<ArtifactReference> {
        let key = transcript_key(channel_id);
        let html = self
            .renderer
            .render(channel_name, messages)
            .map_err(|e| DeskError::ArchivePublishFailed(e.to_string()))?;
        let url = self.publisher.publish(&key, &html).await?;
        info!(channel = %channel_id, %url, messages = messages.len(), "Archived transcript");
        Ok(ArtifactReference { key, url: Some(url) })
    }

    /// Render and publish `messages` (oldest first)
    ///
    /// Never fails; a failed publish yields a reference without a URL.
    pub async fn archive(
        &self,
        channel_id: &ChannelId,
        channel_name: &str,
        messages: &[ChannelMessage],
    ) -> ArtifactReference {
        match self.try_archive(channel_id, channel_name, messages).await {
            Ok(reference) => reference,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "Transcript archive failed, closing without it");
                ArtifactReference {
                    key: transcript_key(channel_id),
                    url: None,
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UserId;
    use chrono::Utc;

    fn messages() -> Vec<ChannelMessage> {
        vec![ChannelMessage {
            id: "m1".to_string(),
            author_id: UserId::new("u1"),
            author_tag: "user".to_string(),
            content: "hello".to_string(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }]
    }

    #[tokio::test]
    async fn test_archive_returns_locator() {
        let publisher = Arc::new(MemoryPublisher::new("https://cdn.example.com/t"));
        let archiver = TranscriptArchiver::new(publisher.clone()).unwrap();

        let reference = archiver
            .archive(&ChannelId::new("42"), "ticket-inquiry-0001", &messages())
            .await;

        assert!(reference.is_published());
        assert_eq!(reference.locator(), "https://cdn.example.com/t/42.html");
        assert!(reqwest::Url::parse(reference.locator()).is_ok());
        assert!(publisher.document("42.html").unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn test_archive_degrades_on_publish_failure() {
        let publisher = Arc::new(MemoryPublisher::new("https://cdn.example.com"));
        publisher.set_fail(true);
        let archiver = TranscriptArchiver::new(publisher).unwrap();

        let reference = archiver.archive(&ChannelId::new("42"), "t", &messages()).await;
        assert!(!reference.is_published());
        assert_eq!(reference.locator(), UNAVAILABLE_PLACEHOLDER);
        assert_eq!(reference.key, "42.html");
    }
}
