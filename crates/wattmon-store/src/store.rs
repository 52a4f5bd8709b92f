//! The document-store boundary and its HTTP implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use time::Date;
use tracing::debug;
use wattmon_types::{EnergyDay, Metadata, format_day};

use crate::error::{Error, Result};

/// Document id of the per-device household metadata document.
const META_DOC: &str = "meta";

/// The document-store collaborator: per-device daily records and household
/// metadata. One database per device, daily documents keyed by date label.
///
/// Persistence, querying, and view aggregation belong to the store itself;
/// this boundary only fetches and writes whole documents.
#[async_trait]
pub trait EnergyStore: Send + Sync {
    /// A device's daily record. A missing document yields an empty day, not
    /// an error.
    async fn fetch_day(&self, device: &str, date: Date) -> Result<EnergyDay>;

    /// Create or replace a device's daily record.
    async fn store_day(&self, device: &str, day: &EnergyDay) -> Result<()>;

    /// The device's household metadata document (empty when absent).
    async fn fetch_meta(&self, device: &str) -> Result<Metadata>;

    /// Set one metadata field, creating the document when needed.
    async fn set_meta_field(&self, device: &str, field: &str, value: Value) -> Result<()>;
}

/// CouchDB-style HTTP implementation of [`EnergyStore`].
///
/// Daily documents live at `{base}/{device}/{YYYY-MM-DD}` and carry the
/// [`EnergyDay`] wire shape (`date`, `energy_data`) alongside the store's
/// own `_id`/`_rev` bookkeeping; updates re-submit the current `_rev`.
#[derive(Debug, Clone)]
pub struct CouchStore {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl CouchStore {
    /// Create a store client for `base_url` with basic-auth credentials.
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        // Normalize URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(Error::Request)?;

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// The base URL documents are fetched from.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn doc_url(&self, device: &str, doc: &str) -> String {
        format!("{}/{}/{}", self.base_url, device, doc)
    }

    /// GET a raw document. `None` when the store has no such document.
    async fn get_doc(&self, url: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::NotReachable {
                url: url.to_string(),
                source: e,
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = Self::handle_response(response).await?;
        Ok(Some(value))
    }

    /// PUT a document, carrying over the current `_rev` when it exists.
    async fn put_doc(&self, url: &str, mut doc: Value) -> Result<()> {
        if let Some(existing) = self.get_doc(url).await?
            && let Some(rev) = existing.get("_rev")
        {
            doc["_rev"] = rev.clone();
        }

        let response = self
            .client
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&doc)
            .send()
            .await
            .map_err(|e| Error::NotReachable {
                url: url.to_string(),
                source: e,
            })?;

        Self::handle_response(response).await.map(|_: Value| ())
    }

    async fn handle_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(Error::Request)
        } else {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());

            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl EnergyStore for CouchStore {
    async fn fetch_day(&self, device: &str, date: Date) -> Result<EnergyDay> {
        let label = format_day(date);
        let url = self.doc_url(device, &label);

        match self.get_doc(&url).await? {
            Some(doc) => {
                let day: EnergyDay = serde_json::from_value(doc)?;
                debug!(device, date = %label, records = day.records.len(), "fetched daily record");
                Ok(day)
            }
            None => {
                debug!(device, date = %label, "no daily record in store");
                Ok(EnergyDay::empty(date))
            }
        }
    }

    async fn store_day(&self, device: &str, day: &EnergyDay) -> Result<()> {
        let label = format_day(day.date);
        let url = self.doc_url(device, &label);

        let doc = serde_json::to_value(day)?;
        self.put_doc(&url, doc).await?;
        debug!(device, date = %label, records = day.records.len(), "stored daily record");
        Ok(())
    }

    async fn fetch_meta(&self, device: &str) -> Result<Metadata> {
        let url = self.doc_url(device, META_DOC);

        match self.get_doc(&url).await? {
            Some(Value::Object(mut fields)) => {
                // Strip the store's own bookkeeping fields.
                fields.retain(|k, _| !k.starts_with('_'));
                Ok(serde_json::from_value(Value::Object(fields))?)
            }
            _ => Ok(Metadata::new()),
        }
    }

    async fn set_meta_field(&self, device: &str, field: &str, value: Value) -> Result<()> {
        let url = self.doc_url(device, META_DOC);

        let mut doc = match self.get_doc(&url).await? {
            Some(doc) if doc.is_object() => doc,
            _ => Value::Object(serde_json::Map::new()),
        };
        doc[field] = value;
        self.put_doc(&url, doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store = CouchStore::new("http://localhost:5984", "admin", "secret");
        assert!(store.is_ok());
        assert_eq!(store.unwrap().base_url(), "http://localhost:5984");
    }

    #[test]
    fn test_store_normalizes_url() {
        let store = CouchStore::new("http://localhost:5984/", "admin", "secret").unwrap();
        assert_eq!(store.base_url(), "http://localhost:5984");
    }

    #[test]
    fn test_store_invalid_url() {
        let result = CouchStore::new("localhost:5984", "admin", "secret");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_doc_url_layout() {
        let store = CouchStore::new("http://db.example:5984", "u", "p").unwrap();
        assert_eq!(
            store.doc_url("emon01", "2024-03-01"),
            "http://db.example:5984/emon01/2024-03-01"
        );
        assert_eq!(store.doc_url("emon01", META_DOC), "http://db.example:5984/emon01/meta");
    }

    #[test]
    fn test_day_parses_with_store_bookkeeping_fields() {
        // Documents come back with _id/_rev; the wire shape must tolerate them.
        let doc = serde_json::json!({
            "_id": "2024-03-01",
            "_rev": "3-abc",
            "date": "2024-03-01",
            "energy_data": [{"timestamp": 1709251205.0, "power": 410.0}],
        });
        let day: EnergyDay = serde_json::from_value(doc).unwrap();
        assert_eq!(day.records.len(), 1);
    }
}
