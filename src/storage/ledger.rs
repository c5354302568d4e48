use std::sync::Arc;
use tracing::{error, warn};

use super::document::TicketDocument;
use super::repository::{StoreSnapshot, TicketStore};
use crate::error::{DeskError, Result};

/// Read-modify-write access to the ticket store
///
/// Every mutation re-reads the document immediately before writing and
/// sends the revision it read, so a concurrent writer causes a retry instead
/// of silently discarding the other change.
#[derive(Clone)]
pub struct TicketLedger {
    store: Arc<dyn TicketStore>,
    max_attempts: u32,
}

impl std::fmt::Debug for TicketLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketLedger")
            .field("store", &"Arc<dyn TicketStore>")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl TicketLedger {
    pub fn new(store: Arc<dyn TicketStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Read the current document
    pub async fn snapshot(&self, context: &str) -> Result<StoreSnapshot> {
        self.store.fetch_all().await.map_err(|e| {
            let err = as_store_error(context, e);
            error!(context, error = %err, "Ticket store read failed");
            err
        })
    }

    /// Apply `mutate` to a fresh copy of the document and write it back
    ///
    /// `mutate` runs once per attempt and may reject the change by returning
    /// an error, in which case nothing is written.
    pub async fn update<T, F>(&self, context: &str, mut mutate: F) -> Result<T>
    where
        F: FnMut(&mut TicketDocument) -> Result<T> + Send,
        T: Send,
    {
        for attempt in 1..=self.max_attempts {
            let mut snapshot = self.snapshot(context).await?;
            let value = mutate(&mut snapshot.document)?;

            match self
                .store
                .replace_all(&snapshot.document, Some(snapshot.revision))
                .await
            {
                Ok(_) => return Ok(value),
                Err(DeskError::StoreConflict) => {
                    warn!(context, attempt, "Ticket store changed during update, retrying");
                },
                Err(e) => {
                    let err = as_store_error(context, e);
                    error!(context, error = %err, "Ticket store write failed");
                    return Err(err);
                },
            }
        }

        let err = DeskError::store(
            context,
            format!("document kept changing across {} attempts", self.max_attempts),
        );
        error!(context, error = %err, "Ticket store update gave up");
        Err(err)
    }
}

fn as_store_error(context: &str, err: DeskError) -> DeskError {
    match err {
        DeskError::StoreUnavailable { .. } => err,
        other => DeskError::store(context, other),
    }
}
