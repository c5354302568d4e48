//! Channel naming rules

use once_cell::sync::Lazy;
use regex::Regex;

use super::CategoryType;

/// Prefix shared by every ticket channel name
pub const CHANNEL_PREFIX: &str = "ticket-";

/// Host platforms cap channel names at this many characters
const MAX_CHANNEL_NAME_LEN: usize = 100;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize a requested ticket name: lowercase, trimmed, whitespace runs
/// collapsed to single hyphens
#[must_use]
pub fn normalize_name(requested: &str) -> String {
    WHITESPACE_RUN
        .replace_all(requested.trim(), "-")
        .to_lowercase()
}

/// Channel name for a renamed ticket, or `None` if nothing remains after
/// normalization
#[must_use]
pub fn renamed_channel_name(requested: &str) -> Option<String> {
    let normalized = normalize_name(requested);
    if normalized.is_empty() {
        return None;
    }
    Some(truncate(format!("{CHANNEL_PREFIX}{normalized}")))
}

/// Default channel name for a freshly created ticket
#[must_use]
pub fn default_channel_name(category: CategoryType, ticket_number: u32) -> String {
    format!("{CHANNEL_PREFIX}{}-{ticket_number:04}", category.slug())
}

fn truncate(name: String) -> String {
    if name.chars().count() <= MAX_CHANNEL_NAME_LEN {
        return name;
    }
    name.chars().take(MAX_CHANNEL_NAME_LEN).collect()
}
