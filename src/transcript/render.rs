use chrono::SecondsFormat;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::Result;
use crate::platform::ChannelMessage;

// The `.html` suffix turns on tera's autoescaping for every variable.
const TEMPLATE_NAME: &str = "transcript.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Transcript: {{ channel_name }}</title>
<style>
body { font-family: sans-serif; background: #313338; color: #dbdee1; margin: 2em; }
.message { margin-bottom: 1em; }
.author { font-weight: bold; color: #f2f3f5; }
time { color: #949ba4; font-size: 0.8em; margin-left: 0.5em; }
.content { white-space: pre-wrap; }
.attachment a { color: #00a8fc; }
</style>
</head>
<body>
<h1>{{ channel_name }}</h1>
<p class="summary">{{ messages | length }} message(s)</p>
{% if messages | length == 0 %}<p class="empty">No messages.</p>
{% endif %}{% for message in messages %}<div class="message">
<div class="meta"><span class="author">{{ message.author }}</span><time datetime="{{ message.timestamp }}">{{ message.display_time }}</time></div>
{% if message.content %}<div class="content">{{ message.content }}</div>
{% endif %}{% for attachment in message.attachments %}<div class="attachment"><a href="{{ attachment }}">{{ attachment }}</a></div>
{% endfor %}</div>
{% endfor %}</body>
</html>
"#;

#[derive(Serialize)]
struct MessageView<'a> {
    author: &'a str,
    timestamp: String,
    display_time: String,
    content: &'a str,
    attachments: &'a [String],
}

/// Renders a message sequence into a self-contained HTML page
///
/// Output depends only on the channel name and the messages; nothing about
/// the time of rendering is included.
#[derive(Debug, Clone)]
pub struct TranscriptRenderer {
    tera: Tera,
}

impl TranscriptRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Render `messages`, which must already be oldest-first
    pub fn render(&self, channel_name: &str, messages: &[ChannelMessage]) -> Result<String> {
        let views: Vec<MessageView<'_>> = messages
            .iter()
            .map(|m| MessageView {
                author: &m.author_tag,
                timestamp: m.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                display_time: m.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
                content: &m.content,
                attachments: &m.attachments,
            })
            .collect();

        let mut context = Context::new();
        context.insert("channel_name", channel_name);
        context.insert("messages", &views);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UserId;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, author: &str, content: &str, minute: u32) -> ChannelMessage {
        ChannelMessage {
            id: id.to_string(),
            author_id: UserId::new(author),
            author_tag: author.to_string(),
            content: content.to_string(),
            attachments: Vec::new(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_keeps_order_and_escapes() {
        let renderer = TranscriptRenderer::new().unwrap();
        let messages = vec![
            message("1", "alice", "first <b>bold</b>", 0),
            message("2", "bob", "second", 5),
        ];

        let html = renderer.render("ticket-report-0001", &messages).unwrap();
        assert!(html.contains("<h1>ticket-report-0001</h1>"));
        assert!(html.contains("&lt;b&gt;bold&lt;&#x2F;b&gt;"));
        assert!(!html.contains("<b>bold</b>"));
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        assert!(first < second);
        assert!(html.contains("2025-03-01 12:05 UTC"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = TranscriptRenderer::new().unwrap();
        let mut with_attachment = message("1", "alice", "", 0);
        with_attachment.attachments = vec!["https://cdn.example.com/a.png".to_string()];
        let messages = vec![with_attachment];

        let a = renderer.render("t", &messages).unwrap();
        let b = renderer.render("t", &messages).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("class=\"attachment\""));
        assert!(!a.contains("class=\"content\""));
    }

    #[test]
    fn test_render_empty_history() {
        let renderer = TranscriptRenderer::new().unwrap();
        let html = renderer.render("t", &[]).unwrap();
        assert!(html.contains("No messages."));
    }
}
