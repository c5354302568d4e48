//! ticket-desk - Support-ticket lifecycle engine for chat community servers
//!
//! Members open tickets from a panel; each ticket is a private channel under
//! one of three categories (report, appeal, inquiry). Staff claim, rename,
//! move and transfer tickets, participants come and go, and closing a ticket
//! archives its history as an HTML transcript before the channel is deleted.
//!
//! - [`lifecycle`] holds the state machine and its authorization policy
//! - [`storage`] persists the shared ticket document with optimistic concurrency
//! - [`platform`] describes the chat platform boundaries the engine talks to
//! - [`router`] turns inbound commands, buttons and menus into operations
//! - [`transcript`] renders and publishes closing transcripts

// Allow missing error documentation for internal implementations
#![allow(clippy::missing_errors_doc)]
// Allow some pedantic lints that don't improve code quality
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_self)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::map_unwrap_or)]

//! # Example
//!
//! ```rust,ignore
//! use ticket_desk::router::{InboundAction, Router};
//!
//! let router = Router::new(controller);
//! let reply = router
//!     .dispatch(&InboundAction::ButtonPressed {
//!         id: "report_ticket".to_string(),
//!         actor: "1234".into(),
//!         channel: "5678".into(),
//!     })
//!     .await;
//! println!("{}", reply.content());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod integration;
pub mod lifecycle;
pub mod permissions;
pub mod platform;
pub mod router;
pub mod storage;
pub mod transcript;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use error::{DeskError, Result};
