use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeskError;

/// Intake classification of a ticket
///
/// Fixed at creation; moving the channel to another category does not change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoryType {
    Report,
    Appeal,
    Inquiry,
}

impl CategoryType {
    /// All category types in panel order
    pub const ALL: [Self; 3] = [Self::Report, Self::Appeal, Self::Inquiry];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "Report",
            Self::Appeal => "Appeal",
            Self::Inquiry => "Inquiry",
        }
    }

    /// Lowercase form used in channel names and component ids
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Appeal => "appeal",
            Self::Inquiry => "inquiry",
        }
    }

    /// Label of the panel button that opens this kind of ticket
    #[must_use]
    pub const fn panel_label(&self) -> &'static str {
        match self {
            Self::Report => "Report a user",
            Self::Appeal => "Appeal a punishment",
            Self::Inquiry => "Inquiries",
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "appeal" => Ok(Self::Appeal),
            "inquiry" => Ok(Self::Inquiry),
            _ => Err(DeskError::InvalidInput(format!(
                "Invalid category: {s}. Must be one of: report, appeal, inquiry"
            ))),
        }
    }
}
