//! Core ticket domain types

mod builders;
mod category;
mod id;
pub mod naming;
mod ticket;

pub use builders::TicketBuilder;
pub use category::CategoryType;
pub use id::{ChannelId, RoleId, UserId};
pub use ticket::{CURRENT_SCHEMA_VERSION, Ticket, TicketRecord, TicketStatus};
