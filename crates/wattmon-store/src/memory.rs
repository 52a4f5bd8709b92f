//! In-memory store for tests and offline development.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use time::Date;
use tokio::sync::Mutex;
use wattmon_types::{EnergyDay, Metadata, format_day};

use crate::error::Result;
use crate::store::EnergyStore;

/// An [`EnergyStore`] backed by process memory.
///
/// Mirrors the document semantics of the HTTP store (missing day → empty
/// day, missing metadata → empty metadata) without any network, so service
/// handlers and the scheduler can be exercised hermetically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    days: Mutex<HashMap<(String, String), EnergyDay>>,
    metas: Mutex<HashMap<String, Metadata>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a daily record.
    pub async fn put_day(&self, device: &str, day: EnergyDay) {
        self.days
            .lock()
            .await
            .insert((device.to_string(), format_day(day.date)), day);
    }

    /// Seed a device's metadata document.
    pub async fn put_meta(&self, device: &str, meta: Metadata) {
        self.metas.lock().await.insert(device.to_string(), meta);
    }

    /// Number of stored daily records.
    pub async fn day_count(&self) -> usize {
        self.days.lock().await.len()
    }
}

#[async_trait]
impl EnergyStore for MemoryStore {
    async fn fetch_day(&self, device: &str, date: Date) -> Result<EnergyDay> {
        let key = (device.to_string(), format_day(date));
        Ok(self
            .days
            .lock()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_else(|| EnergyDay::empty(date)))
    }

    async fn store_day(&self, device: &str, day: &EnergyDay) -> Result<()> {
        self.put_day(device, day.clone()).await;
        Ok(())
    }

    async fn fetch_meta(&self, device: &str) -> Result<Metadata> {
        Ok(self
            .metas
            .lock()
            .await
            .get(device)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_meta_field(&self, device: &str, field: &str, value: Value) -> Result<()> {
        let mut metas = self.metas.lock().await;
        metas
            .entry(device.to_string())
            .or_default()
            .set(field, value);
        Ok(())
    }
}
