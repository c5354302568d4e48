//! Error types for ticket-desk
//!
//! Every lifecycle operation reports failure through [`DeskError`]. The variants
//! follow the lifecycle failure taxonomy: authorization and precondition failures
//! are terminal and shown to the actor, store failures abort the operation, and
//! partial side effects are logged for manual reconciliation.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DeskError>;

/// A precondition that a lifecycle operation found violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The channel has no ticket record
    NotATicket { channel: String },
    /// The owner already has an open ticket of this category
    DuplicateTicket { channel: String, category: String },
    /// Someone already claimed the ticket
    AlreadyClaimed { claimer: String },
    /// Transfer target already owns the ticket
    SameOwner,
    /// The identity is not a member of the server
    NotAMember { user: String },
    /// The requested name is empty after normalization
    InvalidName,
    /// The category identifier is not one of the configured ticket categories
    UnknownCategory { category: String },
    /// The close confirmation prompt is no longer valid
    ConfirmationExpired,
    /// The ticket owner cannot be removed as a participant
    OwnerCannotBeRemoved,
    /// The member is blacklisted from opening appeals
    AppealBlacklisted,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotATicket { .. } => write!(f, "This channel is not a ticket."),
            Self::DuplicateTicket { channel, category } => write!(
                f,
                "You already have an open {category} ticket: <#{channel}>."
            ),
            Self::AlreadyClaimed { claimer } => {
                write!(f, "This ticket has already been claimed by <@{claimer}>.")
            },
            Self::SameOwner => write!(f, "This user is already the ticket owner."),
            Self::NotAMember { .. } => write!(f, "The user is not in this server."),
            Self::InvalidName => write!(f, "The new ticket name cannot be empty."),
            Self::UnknownCategory { .. } => write!(f, "That is not a ticket category."),
            Self::ConfirmationExpired => write!(
                f,
                "This confirmation has expired. Press the close button again."
            ),
            Self::OwnerCannotBeRemoved => write!(
                f,
                "The ticket owner cannot be removed. Transfer the ticket instead."
            ),
            Self::AppealBlacklisted => write!(f, "You are not allowed to open appeals."),
        }
    }
}

/// Main error type for ticket-desk
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Unauthorized to {operation}: {reason}")]
    Unauthorized { operation: String, reason: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(Precondition),

    #[error("Ticket store unavailable while {context}: {message}")]
    StoreUnavailable { context: String, message: String },

    #[error("Ticket store changed since it was read")]
    StoreConflict,

    #[error("{effect} succeeded but the ticket store was not updated: {message}")]
    ExternalSideEffectPartial { effect: String, message: String },

    #[error("Transcript publishing failed: {0}")]
    ArchivePublishFailed(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Platform request failed: {0}")]
    Platform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("{0}")]
    Custom(String),
}

impl DeskError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Shorthand for a store failure with context
    pub fn store(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a platform failure
    pub fn platform(message: impl fmt::Display) -> Self {
        Self::Platform(message.to_string())
    }

    /// Shorthand for an unauthorized operation
    pub fn unauthorized(operation: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Short message suitable for a private reply to the actor
    ///
    /// Store and partial-effect details stay in the log; the actor only sees
    /// a generic failure for those.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { .. } => "You do not have permission to do that.".to_string(),
            Self::PreconditionFailed(precondition) => precondition.to_string(),
            Self::StoreUnavailable { .. } | Self::StoreConflict => {
                "Ticket data could not be loaded or saved. Please try again.".to_string()
            },
            Self::ExternalSideEffectPartial { .. } => {
                "The change was applied but could not be recorded. Staff have been alerted."
                    .to_string()
            },
            Self::Platform(_) => "The server rejected the request.".to_string(),
            Self::InvalidInput(message) => message.clone(),
            _ => "Something went wrong.".to_string(),
        }
    }

    /// Suggestions for fixing the error, shown by the CLI
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(_) => vec![
                "Check the config file passed with --config".to_string(),
                "Set REPORT_CATEGORY, APPEAL_CATEGORY, INQUIRY_CATEGORY and LOG_CHANNEL"
                    .to_string(),
            ],
            Self::StoreUnavailable { .. } => vec![
                "Verify the store backend settings and credentials".to_string(),
                "Retry once the remote document is reachable".to_string(),
            ],
            Self::ExternalSideEffectPartial { .. } => vec![
                "Compare live channels with `ticket-desk tickets reconcile`".to_string(),
            ],
            _ => vec![],
        }
    }

    /// Whether retrying the same operation may succeed
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::StoreConflict | Self::Platform(_)
        )
    }

    /// Whether the error comes from configuration
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether the error is an expected rejection rather than a fault
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::PreconditionFailed(_) | Self::InvalidInput(_)
        )
    }
}

impl From<Precondition> for DeskError {
    fn from(precondition: Precondition) -> Self {
        Self::PreconditionFailed(precondition)
    }
}

impl From<config::ConfigError> for DeskError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<csv::Error> for DeskError {
    fn from(err: csv::Error) -> Self {
        Self::Custom(format!("CSV error: {err}"))
    }
}
