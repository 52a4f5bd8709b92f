//! The periodic disaggregation scheduler.
//!
//! Once per day, after the day boundary has passed and upstream ingestion
//! has had time to flush, every registered device's finished day is fetched,
//! regularized, disaggregated, and written back. Devices are processed
//! sequentially; one device's failure is logged and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use time::{Date, UtcOffset};
use tokio::time::{interval, sleep};
use tracing::{error, info};

use wattmon_nilm::{CommandRunner, Disaggregator, ModelRunner, regularize};
use wattmon_store::EnergyStore;
use wattmon_types::format_day;

use crate::state::AppState;

/// Background scheduler driving the daily disaggregation pass.
pub struct Scheduler {
    state: Arc<AppState>,
    disaggregator: Disaggregator<CommandRunner>,
    check_interval: Duration,
    settle_delay: Duration,
}

impl Scheduler {
    /// Create a scheduler from the application state's configuration.
    pub async fn new(state: Arc<AppState>) -> Self {
        let config = state.config.read().await;
        let runner = CommandRunner::new(
            config.pipeline.runner.clone(),
            config.pipeline.output_dir.clone(),
        );
        let disaggregator = Disaggregator::new(runner, config.pipeline.input_path.clone());
        let check_interval = Duration::from_secs(config.pipeline.check_interval);
        let settle_delay = Duration::from_secs(config.pipeline.settle_delay);
        drop(config);

        Self {
            state,
            disaggregator,
            check_interval,
            settle_delay,
        }
    }

    /// Start the scheduler loop. Returns immediately; the loop runs in the
    /// background until the process exits.
    pub fn start(self) {
        tokio::spawn(async move {
            self.run().await;
        });
    }

    async fn run(self) {
        if self.state.registry.is_empty() {
            info!("No devices registered for disaggregation");
            return;
        }

        info!(
            devices = self.state.registry.len(),
            check_interval = self.check_interval.as_secs(),
            "Starting disaggregation scheduler"
        );
        self.state.scheduler.set_running(true);

        let mut ticker = interval(self.check_interval);
        let mut current_day = self.state.today();

        loop {
            ticker.tick().await;

            let today = self.state.today();
            if today == current_day {
                continue;
            }

            // A new day began. Let upstream ingestion flush the finished
            // day's last records before reading them.
            sleep(self.settle_delay).await;

            if let Some(finished) = today.previous_day() {
                self.process_day(finished).await;
            }
            current_day = today;
        }
    }

    /// Run the pipeline for every registered device, sequentially.
    pub async fn process_day(&self, date: Date) {
        for device in self.state.registry.ids() {
            match process_device(
                self.state.store.as_ref(),
                &self.disaggregator,
                self.state.offset,
                device,
                date,
            )
            .await
            {
                Ok(records) => {
                    info!(device, date = %format_day(date), records, "disaggregation complete");
                    self.state.scheduler.record_success(device).await;
                }
                Err(e) => {
                    // Isolation boundary: the remaining devices still run.
                    error!(device, date = %format_day(date), "disaggregation failed: {e}");
                    self.state
                        .scheduler
                        .record_failure(device, &e.to_string())
                        .await;
                }
            }
        }
    }
}

/// Fetch, regularize, disaggregate, and store one device's day.
///
/// Returns the number of records written back. Shared between the scheduler
/// and the `disaggregate` CLI subcommand.
pub async fn process_device<R: ModelRunner>(
    store: &dyn EnergyStore,
    disaggregator: &Disaggregator<R>,
    offset: UtcOffset,
    device: &str,
    date: Date,
) -> Result<usize, SchedulerError> {
    let day = store
        .fetch_day(device, date)
        .await
        .map_err(SchedulerError::Fetch)?;
    let table = regularize(&day, offset).map_err(SchedulerError::Pipeline)?;

    let meta = store
        .fetch_meta(device)
        .await
        .map_err(SchedulerError::Fetch)?;
    let enriched = disaggregator
        .disaggregate(&table, &meta)
        .await
        .map_err(SchedulerError::Pipeline)?;

    let out = enriched.into_day();
    let records = out.records.len();
    store
        .store_day(device, &out)
        .await
        .map_err(SchedulerError::Store)?;

    Ok(records)
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to fetch from store: {0}")]
    Fetch(wattmon_store::Error),
    #[error("{0}")]
    Pipeline(wattmon_nilm::Error),
    #[error("Failed to store result: {0}")]
    Store(wattmon_store::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use wattmon_nilm::PERIODS;
    use wattmon_store::MemoryStore;
    use wattmon_types::{EnergyDay, Metadata, SensorRecord};

    fn day_with_power(date: Date, offset: UtcOffset) -> EnergyDay {
        let midnight = date.midnight().assume_offset(offset).unix_timestamp() as f64;
        let records = (0..10)
            .map(|i| {
                let mut r = SensorRecord::new();
                r.set("timestamp", Some(midnight + (i * 5) as f64 + 1.0));
                r.set("power", Some(100.0 + i as f64));
                r
            })
            .collect();
        EnergyDay { date, records }
    }

    fn disaggregator(dir: &tempfile::TempDir) -> Disaggregator<CommandRunner> {
        // With no appliances flagged the model is never invoked, so the
        // command path can be arbitrary.
        Disaggregator::new(
            CommandRunner::new("/opt/nilm/run", dir.path().join("out")),
            dir.path().join("input.csv"),
        )
    }

    #[tokio::test]
    async fn test_process_device_writes_back_full_grid() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let offset = UtcOffset::UTC;
        let date = date!(2024 - 03 - 01);

        store.put_day("emon01", day_with_power(date, offset)).await;
        store.put_meta("emon01", Metadata::new()).await;

        let records = process_device(&store, &disaggregator(&dir), offset, "emon01", date)
            .await
            .unwrap();
        assert_eq!(records, PERIODS);

        let stored = store.fetch_day("emon01", date).await.unwrap();
        assert_eq!(stored.records.len(), PERIODS);
        // With no appliance predictions, the residual is the power itself.
        assert_eq!(stored.records[0].get("noise"), Some(100.0));
        assert_eq!(stored.records[0].get("power"), Some(100.0));
        // A slot with no reading carries no derived output.
        assert_eq!(stored.records[100].get("noise"), None);
    }

    #[tokio::test]
    async fn test_process_device_empty_day_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let date = date!(2024 - 03 - 01);

        let result = process_device(
            &store,
            &disaggregator(&dir),
            UtcOffset::UTC,
            "emon01",
            date,
        )
        .await;

        assert!(matches!(
            result,
            Err(SchedulerError::Pipeline(wattmon_nilm::Error::EmptyInput))
        ));
        // Nothing was written back for the failed day.
        assert_eq!(store.day_count().await, 0);
    }
}
