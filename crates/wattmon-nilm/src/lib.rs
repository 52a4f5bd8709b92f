//! Time-series regularization and NILM disaggregation for wattmon.
//!
//! This crate is the core of the backend: it turns irregularly-sampled,
//! possibly-duplicated, possibly-gapped sensor readings into a
//! fixed-cadence day table, feeds the mains signal to an external
//! appliance-disaggregation model, and reconstitutes the model's
//! per-appliance predictions into a timestamp-aligned, unit-consistent
//! energy record with a residual `noise` channel.
//!
//! Two stages compose, consumed leaf-first:
//!
//! 1. [`regularize`] — irregular records onto the continuous day grid
//!    ([`PERIODS`] slots, [`INTERVAL`] seconds apart).
//! 2. [`Disaggregator`] — mains extraction, model hand-off through the
//!    [`ModelRunner`] seam, and the merge that enforces alignment, scaling,
//!    and conservation.
//!
//! # Example
//!
//! ```no_run
//! use time::macros::offset;
//! use wattmon_nilm::{CommandRunner, Disaggregator, regularize};
//!
//! # async fn example(day: wattmon_types::EnergyDay, meta: wattmon_types::Metadata)
//! # -> wattmon_nilm::Result<()> {
//! let table = regularize(&day, offset!(+1))?;
//! let runner = CommandRunner::new("/opt/nilm/run", "/var/lib/wattmon/nilm/output");
//! let disaggregator = Disaggregator::new(runner, "/var/lib/wattmon/nilm/input/data.csv");
//! let enriched = disaggregator.disaggregate(&table, &meta).await?;
//! let day_out = enriched.into_day();
//! # Ok(())
//! # }
//! ```

pub mod appliance;
pub mod disaggregate;
pub mod error;
pub mod regularize;
pub mod runner;
pub mod table;

pub use appliance::Appliance;
pub use disaggregate::{Disaggregator, NOISE_FIELD, household_appliances};
pub use error::{Error, Result};
pub use regularize::regularize;
pub use runner::{CommandRunner, ModelRunner};
pub use table::RegularTable;

/// Sample cadence of the regularized grid, in seconds.
pub const INTERVAL: u32 = 5;

/// Number of grid slots in one calendar day.
pub const PERIODS: usize = (86_400 / INTERVAL) as usize;
