//! The fixed-cadence day table produced by regularization.

use time::{Date, OffsetDateTime, UtcOffset};
use wattmon_types::{EnergyDay, SensorRecord, TIMESTAMP_FIELD};

use crate::error::{Error, Result};
use crate::{INTERVAL, PERIODS};

/// One named value column, always [`PERIODS`] slots long.
#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

/// A table indexed by the continuous time grid of one calendar day:
/// [`PERIODS`] equally spaced instants, [`INTERVAL`] seconds apart, starting
/// at local midnight.
///
/// Each slot row either holds the single record that quantized onto it, or
/// is empty (all-null). The grid itself is implicit: slot `i` is midnight
/// plus `i * INTERVAL` seconds in the table's fixed UTC offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularTable {
    date: Date,
    offset: UtcOffset,
    midnight_unix: i64,
    columns: Vec<Column>,
}

impl RegularTable {
    /// Create an all-null table for `date` with the given value columns.
    pub fn new(date: Date, offset: UtcOffset, names: impl IntoIterator<Item = String>) -> Self {
        let midnight_unix = date.midnight().assume_offset(offset).unix_timestamp();
        Self {
            date,
            offset,
            midnight_unix,
            columns: names
                .into_iter()
                .map(|name| Column {
                    name,
                    values: vec![None; PERIODS],
                })
                .collect(),
        }
    }

    /// The calendar day this table spans.
    pub fn date(&self) -> Date {
        self.date
    }

    /// The fixed UTC offset the grid was built in.
    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Number of rows; always [`PERIODS`].
    pub fn len(&self) -> usize {
        PERIODS
    }

    /// Tables are never empty; present for completeness.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The grid instant of slot `row` as Unix epoch seconds.
    pub fn slot_unix(&self, row: usize) -> f64 {
        (self.midnight_unix + (row as i64) * i64::from(INTERVAL)) as f64
    }

    /// The grid instant of slot `row`.
    pub fn slot_instant(&self, row: usize) -> OffsetDateTime {
        let instant = OffsetDateTime::from_unix_timestamp(
            self.midnight_unix + (row as i64) * i64::from(INTERVAL),
        )
        // Slots lie within one calendar day of a valid Date, so the
        // timestamp is always representable.
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        instant.to_offset(self.offset)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Whether a value column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Borrow a value column by name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Set one cell. Unknown columns are ignored.
    pub fn set(&mut self, row: usize, name: &str, value: Option<f64>) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == name) {
            column.values[row] = value;
        }
    }

    /// Append a new value column. Fails when the name is taken or the
    /// length is not [`PERIODS`].
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::DisaggregationFailed(format!(
                "column `{name}` already exists"
            )));
        }
        if values.len() != PERIODS {
            return Err(Error::DisaggregationFailed(format!(
                "column `{}` has {} rows, expected {}",
                name,
                values.len(),
                PERIODS
            )));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Remove a value column if present.
    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Null out every value column of `row`. The grid timestamp is implicit
    /// and therefore untouched.
    pub fn mask_row(&mut self, row: usize) {
        for column in &mut self.columns {
            column.values[row] = None;
        }
    }

    /// Convert back into an [`EnergyDay`]: one record per slot, with the
    /// grid instant restored under the `timestamp` field.
    pub fn into_day(self) -> EnergyDay {
        let mut records = Vec::with_capacity(PERIODS);
        for row in 0..PERIODS {
            let mut record: SensorRecord = self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.values[row]))
                .collect();
            record.set(TIMESTAMP_FIELD, Some(self.slot_unix(row)));
            records.push(record);
        }
        EnergyDay {
            date: self.date,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, offset};

    fn table() -> RegularTable {
        RegularTable::new(
            date!(2024 - 03 - 01),
            offset!(+1),
            ["power".to_string(), "kwh".to_string()],
        )
    }

    #[test]
    fn test_new_table_is_all_null() {
        let t = table();
        assert_eq!(t.len(), PERIODS);
        assert!(t.column("power").unwrap().iter().all(Option::is_none));
        assert!(t.column("kwh").unwrap().iter().all(Option::is_none));
        assert!(t.column("missing").is_none());
    }

    #[test]
    fn test_slot_instants_are_strictly_increasing() {
        let t = table();
        assert_eq!(t.slot_unix(1) - t.slot_unix(0), f64::from(INTERVAL));
        assert_eq!(
            t.slot_unix(PERIODS - 1) - t.slot_unix(0),
            f64::from(INTERVAL) * (PERIODS as f64 - 1.0)
        );

        let first = t.slot_instant(0);
        assert_eq!(first.date(), date!(2024 - 03 - 01));
        assert_eq!((first.hour(), first.minute(), first.second()), (0, 0, 0));

        let second = t.slot_instant(1);
        assert_eq!(second.second(), 5);
    }

    #[test]
    fn test_set_and_mask_row() {
        let mut t = table();
        t.set(3, "power", Some(120.0));
        t.set(3, "kwh", Some(1.5));
        t.set(3, "unknown", Some(9.9)); // ignored

        assert_eq!(t.column("power").unwrap()[3], Some(120.0));

        t.mask_row(3);
        assert_eq!(t.column("power").unwrap()[3], None);
        assert_eq!(t.column("kwh").unwrap()[3], None);
    }

    #[test]
    fn test_push_column_rejects_bad_shape_and_duplicates() {
        let mut t = table();
        assert!(t.push_column("pred_fridge", vec![Some(1.0); PERIODS]).is_ok());
        assert!(t.push_column("pred_fridge", vec![Some(1.0); PERIODS]).is_err());
        assert!(t.push_column("noise", vec![None; PERIODS - 1]).is_err());
    }

    #[test]
    fn test_into_day_restores_grid_timestamps() {
        let mut t = table();
        t.set(1, "power", Some(300.0));
        let midnight = t.slot_unix(0);

        let day = t.into_day();
        assert_eq!(day.records.len(), PERIODS);
        assert_eq!(day.records[0].timestamp(), Some(midnight));
        assert_eq!(
            day.records[1].timestamp(),
            Some(midnight + f64::from(INTERVAL))
        );
        assert_eq!(day.records[1].get("power"), Some(300.0));
        assert_eq!(day.records[0].get("power"), None);
        assert!(day.records[0].has("kwh"));
    }
}
