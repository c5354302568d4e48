use async_trait::async_trait;

use super::document::{Revision, TicketDocument};
use crate::error::Result;

/// A consistent read of the ticket document
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub document: TicketDocument,
    pub revision: Revision,
}

impl StoreSnapshot {
    #[must_use]
    pub fn new(document: TicketDocument) -> Self {
        let revision = document.revision();
        Self { document, revision }
    }
}

/// Storage backend for the shared ticket document
///
/// The only write primitive is a whole-document replace. Passing the
/// revision from the snapshot the change was based on asks the backend to
/// refuse the write with `StoreConflict` if the document changed meanwhile;
/// passing `None` overwrites unconditionally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Reads the entire document
    ///
    /// A failure means "cannot proceed", never "empty store".
    async fn fetch_all(&self) -> Result<StoreSnapshot>;

    /// Overwrites the entire document, returning the new revision
    async fn replace_all(
        &self,
        document: &TicketDocument,
        expected: Option<Revision>,
    ) -> Result<Revision>;
}
