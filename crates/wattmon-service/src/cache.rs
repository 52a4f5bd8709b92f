//! On-disk cache of fetched daily records.
//!
//! Past days are immutable once the disaggregation pass has run, so
//! re-serving them from the central store is wasted round-trips. The cache
//! keeps one JSON file per (device, day); only days strictly before today
//! are ever written, since the current day is still growing.

use std::path::PathBuf;

use time::Date;
use tracing::{debug, warn};
use wattmon_types::{EnergyDay, format_day};

/// File cache for daily records.
#[derive(Debug, Clone)]
pub struct DayCache {
    dir: PathBuf,
    enabled: bool,
}

impl DayCache {
    /// Create a cache rooted at `dir`. A disabled cache never hits disk.
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    fn path(&self, device: &str, date: Date) -> PathBuf {
        self.dir
            .join(device)
            .join(format!("{}.json", format_day(date)))
    }

    /// Look up a cached day. Any read or parse problem is treated as a miss.
    pub fn load(&self, device: &str, date: Date) -> Option<EnergyDay> {
        if !self.enabled {
            return None;
        }
        let path = self.path(device, date);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(day) => {
                debug!(device, date = %format_day(date), "cache hit");
                Some(day)
            }
            Err(e) => {
                warn!(device, path = %path.display(), "discarding unreadable cache entry: {e}");
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    /// Cache a fetched day. Days that have not finished (today or later, in
    /// the pipeline's offset) are never written. Failures are logged and
    /// swallowed; caching is best-effort.
    pub fn store(&self, device: &str, day: &EnergyDay, today: Date) {
        if !self.enabled || day.date >= today {
            return;
        }
        let path = self.path(device, day.date);
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string(day)?;
            std::fs::write(&path, content)
        })();

        if let Err(e) = result {
            warn!(device, path = %path.display(), "failed to write cache entry: {e}");
        }
    }
}
