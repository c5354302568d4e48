//! Handler for `transcript render`

use std::path::Path;

use crate::cli::OutputFormatter;
use crate::config::DeskConfig;
use crate::core::ChannelId;
use crate::error::{DeskError, Result};
use crate::platform::ChannelMessage;
use crate::transcript::{TranscriptRenderer, transcript_key};

/// Render exported channel messages into a transcript page
///
/// The page goes to `output_path`, to the configured publisher when
/// `publish` names a channel, or to stdout otherwise.
///
/// # Errors
///
/// Returns an error if the messages file is not a JSON array of channel
/// messages, or if writing or publishing the page fails.
pub async fn handle_transcript_render(
    messages_path: &Path,
    channel_name: &str,
    output_path: Option<&Path>,
    publish: Option<&str>,
    config_path: Option<&Path>,
    output: &OutputFormatter,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(messages_path).await.map_err(|e| {
        DeskError::InvalidInput(format!(
            "Cannot read messages from {}: {e}",
            messages_path.display()
        ))
    })?;
    let mut messages: Vec<ChannelMessage> = serde_json::from_str(&raw)?;
    messages.sort_by_key(|message| message.timestamp);

    let html = TranscriptRenderer::new()?.render(channel_name, &messages)?;

    if let Some(channel) = publish {
        let config = DeskConfig::load(config_path)?;
        let publisher = config.build_publisher().await?;
        let url = publisher
            .publish(&transcript_key(&ChannelId::new(channel)), &html)
            .await?;
        if output.is_json() {
            return output.print_json(&serde_json::json!({
                "messages": messages.len(),
                "url": url,
            }));
        }
        output.success(&format!("Published transcript: {url}"));
        return Ok(());
    }

    match output_path {
        Some(path) => {
            tokio::fs::write(path, &html).await?;
            if output.is_json() {
                return output.print_json(&serde_json::json!({
                    "messages": messages.len(),
                    "path": path,
                }));
            }
            output.success(&format!(
                "Rendered {} message(s) to {}",
                messages.len(),
                path.display()
            ));
        },
        None => print!("{html}"),
    }
    Ok(())
}
