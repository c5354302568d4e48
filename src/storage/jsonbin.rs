use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::document::{Revision, TicketDocument};
use super::repository::{StoreSnapshot, TicketStore};
use crate::error::{DeskError, Result};

/// Default API root of the hosted JSON document service
pub const DEFAULT_JSONBIN_API: &str = "https://api.jsonbin.io/v3";

/// Ticket store kept in a remote JSON bin
///
/// The service has no conditional write, so a revision check re-reads the
/// bin immediately before the PUT. That narrows the lost-update window
/// without closing it.
#[derive(Debug, Clone)]
pub struct JsonBinStore {
    client: reqwest::Client,
    url: String,
    master_key: String,
}

impl JsonBinStore {
    /// Create a client for the bin `bin_id` under `api_root`
    pub fn new(
        api_root: &str,
        bin_id: &str,
        master_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: bin_url(api_root, bin_id),
            master_key: master_key.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn read_raw(&self) -> Result<Value> {
        let response = self
            .client
            .get(&self.url)
            .header("X-Master-Key", &self.master_key)
            .send()
            .await
            .map_err(|e| DeskError::store("fetching tickets", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskError::store("fetching tickets", format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DeskError::store("decoding the ticket document", e))?;
        extract_record(body)
    }
}

fn bin_url(api_root: &str, bin_id: &str) -> String {
    format!("{}/b/{bin_id}", api_root.trim_end_matches('/'))
}

/// Pull the document out of the service's response envelope
fn extract_record(mut body: Value) -> Result<Value> {
    match body.get_mut("record").map(Value::take) {
        Some(record @ Value::Object(_)) => Ok(record),
        Some(_) => Err(DeskError::store(
            "decoding the ticket document",
            "record is not a JSON object",
        )),
        None => Err(DeskError::store(
            "decoding the ticket document",
            "response has no record",
        )),
    }
}

#[async_trait]
impl TicketStore for JsonBinStore {
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
        if let Some(expected) = expected {
            let current = self.read_raw().await?;
            if Revision::of(&current) != expected {
                return Err(DeskError::StoreConflict);
            }
        }

        let raw = document.to_json();
        let response = self
            .client
            .put(&self.url)
            .header("X-Master-Key", &self.master_key)
            .json(&raw)
            .send()
            .await
            .map_err(|e| DeskError::store("saving tickets", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskError::store("saving tickets", format!("HTTP {status}")));
        }
        Ok(Revision::of(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bin_url() {
        assert_eq!(
            bin_url("https://api.jsonbin.io/v3/", "abc123"),
            "https://api.jsonbin.io/v3/b/abc123"
        );
    }

    #[test]
    fn test_extract_record() {
        let record = extract_record(json!({
            "record": {"c1": {"ownerId": "u1", "categoryType": "Report"}},
            "metadata": {"id": "abc123", "private": true}
        }))
        .unwrap();
        assert!(record.get("c1").is_some());
    }

    #[test]
    fn test_missing_record_is_not_an_empty_store() {
        assert!(matches!(
            extract_record(json!({"message": "Bin not found"})),
            Err(DeskError::StoreUnavailable { .. })
        ));
        assert!(extract_record(json!({"record": []})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let store = JsonBinStore::new(
            "http://127.0.0.1:9",
            "bin",
            "key",
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(matches!(
            store.fetch_all().await,
            Err(DeskError::StoreUnavailable { .. })
        ));
    }
}
