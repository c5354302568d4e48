//! Storage for the shared ticket document
//!
//! [`TicketStore`] is the only component that knows the document's shape on
//! the wire. Lifecycle code goes through [`TicketLedger`], which owns the
//! read-modify-write discipline.

mod document;
mod file;
mod jsonbin;
mod ledger;
mod memory;
mod repository;

pub use document::{Revision, TicketDocument};
pub use file::FileStorage;
pub use jsonbin::{DEFAULT_JSONBIN_API, JsonBinStore};
pub use ledger::TicketLedger;
pub use memory::MemoryStore;
pub use repository::{StoreSnapshot, TicketStore};

#[cfg(test)]
pub use repository::MockTicketStore;
