//! Application state shared across handlers and the scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;
use wattmon_store::EnergyStore;

use crate::cache::DayCache;
use crate::config::Config;
use crate::registry::DeviceRegistry;

/// Shared application state.
pub struct AppState {
    /// The document-store boundary.
    pub store: Arc<dyn EnergyStore>,
    /// Configuration (RwLock for runtime reads from handlers).
    pub config: RwLock<Config>,
    /// The device registry, loaded once at startup.
    pub registry: DeviceRegistry,
    /// Daily-record cache.
    pub cache: DayCache,
    /// Fixed UTC offset the pipeline's day grid is built in.
    pub offset: UtcOffset,
    /// Scheduler control and introspection state.
    pub scheduler: SchedulerState,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Arc<dyn EnergyStore>, config: Config, offset: UtcOffset) -> Arc<Self> {
        let registry = DeviceRegistry::new(config.devices.iter().cloned());
        let cache = DayCache::new(config.cache.dir.clone(), config.cache.enabled);
        Arc::new(Self {
            store,
            config: RwLock::new(config),
            registry,
            cache,
            offset,
            scheduler: SchedulerState::new(),
        })
    }

    /// Today's date in the pipeline's offset.
    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.offset).date()
    }
}

/// State for tracking the disaggregation scheduler.
pub struct SchedulerState {
    /// Whether the scheduler loop is running.
    running: AtomicBool,
    /// When the scheduler was started (Unix timestamp).
    started_at: AtomicU64,
    /// Per-device run statistics.
    pub device_stats: RwLock<Vec<DeviceRunStats>>,
}

impl SchedulerState {
    /// Create a new scheduler state.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            device_stats: RwLock::new(Vec::new()),
        }
    }

    /// Check if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the scheduler as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the scheduler start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Record a successful run for a device.
    pub async fn record_success(&self, device: &str) {
        let mut stats = self.device_stats.write().await;
        let entry = Self::entry(&mut stats, device);
        entry.success_count += 1;
        entry.last_run_at = Some(OffsetDateTime::now_utc());
    }

    /// Record a failed run for a device.
    pub async fn record_failure(&self, device: &str, error: &str) {
        let mut stats = self.device_stats.write().await;
        let entry = Self::entry(&mut stats, device);
        entry.failure_count += 1;
        entry.last_error_at = Some(OffsetDateTime::now_utc());
        entry.last_error = Some(error.to_string());
    }

    fn entry<'a>(stats: &'a mut Vec<DeviceRunStats>, device: &str) -> &'a mut DeviceRunStats {
        if let Some(index) = stats.iter().position(|s| s.device_id == device) {
            &mut stats[index]
        } else {
            stats.push(DeviceRunStats::new(device));
            let last = stats.len() - 1;
            &mut stats[last]
        }
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Disaggregation run statistics for a single device.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceRunStats {
    /// Device identifier.
    pub device_id: String,
    /// Time of last successful run.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    /// Time of last failed run.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Total successful runs.
    pub success_count: u64,
    /// Total failed runs.
    pub failure_count: u64,
}

impl DeviceRunStats {
    fn new(device: &str) -> Self {
        Self {
            device_id: device.to_string(),
            last_run_at: None,
            last_error_at: None,
            last_error: None,
            success_count: 0,
            failure_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattmon_store::MemoryStore;

    fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.devices = vec!["emon01".to_string()];
        config.cache.enabled = false;
        AppState::new(Arc::new(MemoryStore::new()), config, UtcOffset::UTC)
    }

    #[tokio::test]
    async fn test_app_state_new() {
        let state = test_state();
        assert!(state.registry.contains("emon01"));

        let config = state.config.read().await;
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_scheduler_state_running_toggle() {
        let scheduler = SchedulerState::new();
        assert!(!scheduler.is_running());
        assert!(scheduler.started_at().is_none());

        scheduler.set_running(true);
        assert!(scheduler.is_running());
        assert!(scheduler.started_at().is_some());

        scheduler.set_running(false);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_device_stats_accumulate() {
        let scheduler = SchedulerState::new();

        scheduler.record_success("emon01").await;
        scheduler.record_success("emon01").await;
        scheduler.record_failure("emon01", "model runner: exit 1").await;
        scheduler.record_failure("emon02", "no records").await;

        let stats = scheduler.device_stats.read().await;
        assert_eq!(stats.len(), 2);

        let first = stats.iter().find(|s| s.device_id == "emon01").unwrap();
        assert_eq!(first.success_count, 2);
        assert_eq!(first.failure_count, 1);
        assert_eq!(first.last_error.as_deref(), Some("model runner: exit 1"));
        assert!(first.last_run_at.is_some());
    }
}
