use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::document::{Revision, TicketDocument};
use super::repository::{StoreSnapshot, TicketStore};
use crate::error::{DeskError, Result};

/// Ticket store held in process memory
///
/// Keeps the raw JSON so reads go through the same parsing path as the
/// remote backends. Reads and writes can be made to fail for exercising
/// failure handling.
#[derive(Debug)]
pub struct MemoryStore {
    raw: Mutex<Value>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    interleave: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_json(Value::Object(serde_json::Map::new()))
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw document
    #[must_use]
    pub fn from_json(raw: Value) -> Self {
        Self {
            raw: Mutex::new(raw),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            interleave: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed the store with a parsed document
    #[must_use]
    pub fn with_document(document: &TicketDocument) -> Self {
        Self::from_json(document.to_json())
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Yield to the runtime before every read and write
    pub fn set_interleave(&self, interleave: bool) {
        self.interleave.store(interleave, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the raw document
    pub async fn raw(&self) -> Value {
        self.raw.lock().await.clone()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn fetch_all(&self) -> Result<StoreSnapshot> {
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DeskError::store("fetching tickets", "memory store read disabled"));
        }
        let raw = self.raw.lock().await.clone();
        let revision = Revision::of(&raw);
        let document = TicketDocument::from_json(raw)?;
        Ok(StoreSnapshot { document, revision })
    }

    async fn replace_all(
        &self,
        document: &TicketDocument,
        expected: Option<Revision>,
    ) -> Result<Revision> {
        self.pause().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeskError::store("saving tickets", "memory store write disabled"));
        }
        let mut raw = self.raw.lock().await;
        if let Some(expected) = expected {
            if Revision::of(&raw) != expected {
                return Err(DeskError::StoreConflict);
            }
        }
        *raw = document.to_json();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Revision::of(&raw))
    }
}
