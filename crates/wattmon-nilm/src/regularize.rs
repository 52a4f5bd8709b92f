//! The time regularizer: irregular records onto the continuous day grid.

use time::{OffsetDateTime, UtcOffset};
use tracing::debug;
use wattmon_types::{EnergyDay, ORIGINAL_TIMESTAMP_FIELD, SensorRecord, TIMESTAMP_FIELD};

use crate::error::{Error, Result};
use crate::table::RegularTable;
use crate::{INTERVAL, PERIODS};

/// Convert a day of irregular, possibly-duplicated, possibly-gapped records
/// into a fixed-cadence, gap-filled [`RegularTable`].
///
/// The calendar day is taken from the first timestamped record, interpreted
/// in `offset`. Each record is quantized onto the grid by rounding its
/// timestamp **half-up** to the nearest [`INTERVAL`]-second multiple from
/// local midnight; ties resolve deterministically toward the later slot.
///
/// Collisions keep the first record in original order and drop the rest.
/// Records without a `timestamp` field, and records whose rounded slot
/// falls outside the day (e.g. `23:59:58` rounding into the next day's
/// slot 0), are dropped. Unmatched grid slots stay all-null; no
/// interpolation happens here.
///
/// The pre-rounding timestamp of each kept record is preserved in an
/// `original_timestamp` column.
pub fn regularize(day: &EnergyDay, offset: UtcOffset) -> Result<RegularTable> {
    let first_ts = day
        .records
        .iter()
        .find_map(SensorRecord::timestamp)
        .ok_or(Error::EmptyInput)?;

    let date = OffsetDateTime::from_unix_timestamp(first_ts.floor() as i64)?
        .to_offset(offset)
        .date();

    // Value columns in order of first appearance, with the raw timestamp
    // renamed to preserve it alongside the quantized grid.
    let mut names: Vec<String> = Vec::new();
    for record in &day.records {
        for sensor in record.sensors() {
            let name = if sensor == TIMESTAMP_FIELD {
                ORIGINAL_TIMESTAMP_FIELD
            } else {
                sensor
            };
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    let mut table = RegularTable::new(date, offset, names);
    let midnight = table.slot_unix(0);

    let mut filled = vec![false; PERIODS];
    let mut dropped_outside = 0usize;
    let mut dropped_duplicates = 0usize;

    for record in &day.records {
        let Some(ts) = record.timestamp() else {
            continue;
        };

        // Round half-up to the nearest grid slot.
        let slot = ((ts - midnight) / f64::from(INTERVAL) + 0.5).floor();
        if slot < 0.0 || slot >= PERIODS as f64 {
            dropped_outside += 1;
            continue;
        }
        let slot = slot as usize;

        // First-writer-wins on slot collisions.
        if filled[slot] {
            dropped_duplicates += 1;
            continue;
        }
        filled[slot] = true;

        for (sensor, value) in record.iter() {
            if sensor == TIMESTAMP_FIELD {
                table.set(slot, ORIGINAL_TIMESTAMP_FIELD, Some(ts));
            } else {
                table.set(slot, sensor, value);
            }
        }
    }

    if dropped_outside > 0 || dropped_duplicates > 0 {
        debug!(
            date = %table.date(),
            dropped_outside, dropped_duplicates,
            "dropped records during regularization"
        );
    }

    Ok(table)
}
