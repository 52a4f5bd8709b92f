//! Document-store adapter for wattmon daily energy records.
//!
//! The upstream ingestion pipeline writes one document per device per day
//! into a CouchDB-style document store; this crate is the read/write
//! boundary the rest of the system talks through.
//!
//! # Features
//!
//! - [`EnergyStore`] trait: daily records and household metadata
//! - [`CouchStore`]: HTTP implementation (one database per device, daily
//!   documents keyed by `YYYY-MM-DD`, a `meta` document per device)
//! - [`MemoryStore`]: in-memory implementation for tests and offline use
//!
//! # Example
//!
//! ```no_run
//! use time::macros::date;
//! use wattmon_store::{CouchStore, EnergyStore};
//!
//! # async fn example() -> wattmon_store::Result<()> {
//! let store = CouchStore::new("http://localhost:5984", "admin", "secret")?;
//! let day = store.fetch_day("emon01", date!(2024 - 03 - 01)).await?;
//! println!("{} records", day.records.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use store::{CouchStore, EnergyStore};
