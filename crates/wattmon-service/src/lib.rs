//! Disaggregation scheduler and HTTP REST API for wattmon.
//!
//! This crate provides a service that:
//! - Serves per-device daily energy data, consumption aggregates, and
//!   household metadata over HTTP
//! - Once per day, runs the NILM disaggregation pipeline for every
//!   registered device and writes the enriched day back to the store
//! - Caches finished days on disk to spare the central store
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /devices` - Registered device identifiers
//! - `GET /dev_id/{dev}/json/date/{date}` - One day of records
//! - `GET /dev_id/{dev}/json/last_value` - Most recent record from today
//! - `GET /dev_id/{dev}/json/range/{from}/{to}` - A span of days
//! - `GET /dev_id/{dev}/json/date/{date}/consumption` - Daily kWh
//! - `GET /dev_id/{dev}/json/yesterday/consumption` - Yesterday's kWh
//! - `GET /dev_id/{dev}/json/last_month/consumption` - Previous month total
//! - `GET /dev_id/{dev}/json/30days/average_consumption` - 30-day average
//! - `GET /dev_id/{dev}/json/date/{date}/mean-consumption` - kWh over home size
//! - `GET /dev_id/{dev}/meta[/{field}]` - Household metadata
//! - `GET /dev_id/{dev}/has-meta/{field}` / `set-meta/{field}/{value}`
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/wattmon/server.toml`:
//!
//! ```toml
//! devices = ["emon01"]
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [store]
//! url = "http://127.0.0.1:5984"
//! username = "admin"
//! password = "secret"
//!
//! [pipeline]
//! utc_offset = "+01:00"
//! runner = "/opt/nilm/run"
//! input_path = "/var/lib/wattmon/nilm/input/data.csv"
//! output_dir = "/var/lib/wattmon/nilm/output"
//! check_interval = 300
//! settle_delay = 60
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod consumption;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use cache::DayCache;
pub use config::{
    CacheConfig, Config, ConfigError, PipelineConfig, ServerConfig, StoreConfig, ValidationError,
};
pub use registry::DeviceRegistry;
pub use scheduler::{Scheduler, SchedulerError, process_device};
pub use state::{AppState, DeviceRunStats, SchedulerState};
