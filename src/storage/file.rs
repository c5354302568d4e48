use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::document::{Revision, TicketDocument};
use super::repository::{StoreSnapshot, TicketStore};
use crate::error::{DeskError, Result};

/// Ticket store backed by a JSON file on local disk
///
/// Writes go to a sibling temporary file that is then renamed over the
/// document, so readers never observe a half-written file. Revision checks
/// are atomic within this process only.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_raw(&self) -> Result<Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Value::Object(serde_json::Map::new())),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| DeskError::store("parsing the ticket file", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Value::Object(serde_json::Map::new()))
            },
            Err(e) => Err(DeskError::store(
                format!("reading {}", self.path.display()),
                e,
            )),
        }
    }
}

#[async_trait]
impl TicketStore for FileStorage {
    async fn fetch_all(&self) -> Result<StoreSnapshot> {
        let raw = self.read_raw().await?;
        let revision = Revision::of(&raw);
        let document = TicketDocument::from_json(raw)?;
        Ok(StoreSnapshot { document, revision })
    }

    async fn replace_all(
        &self,
        document: &TicketDocument,
        expected: Option<Revision>,
    ) -> Result<Revision> {
        let _guard = self.write_lock.lock().await;

        if let Some(expected) = expected {
            let current = self.read_raw().await?;
            if Revision::of(&current) != expected {
                return Err(DeskError::StoreConflict);
            }
        }

        let raw = document.to_json();
        let content = serde_json::to_string_pretty(&raw)?;
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DeskError::store("creating the store directory", e))?;
            }
        }
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| DeskError::store("writing the ticket file", e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DeskError::store("replacing the ticket file", e))?;

        Ok(Revision::of(&raw))
    }
}
