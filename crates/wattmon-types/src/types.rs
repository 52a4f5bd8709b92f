//! Core data types for energy monitoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use crate::error::{ParseError, ParseResult};

/// Field name carrying the Unix epoch timestamp of a record.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field name carrying the pre-quantization timestamp in regularized output.
pub const ORIGINAL_TIMESTAMP_FIELD: &str = "original_timestamp";

/// Field name carrying the whole-house mains power reading.
pub const POWER_FIELD: &str = "power";

/// Field name carrying the cumulative energy counter.
pub const KWH_FIELD: &str = "kwh";

/// One observation at one instant: a mapping from sensor name to a numeric
/// value, or null when the sensor produced no reading.
///
/// Records are produced by the upstream data source and are immutable once
/// fetched; mutation helpers exist for building derived records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorRecord {
    values: BTreeMap<String, Option<f64>>,
}

impl SensorRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a sensor value. Returns `None` both for absent fields and for
    /// fields that are explicitly null.
    pub fn get(&self, sensor: &str) -> Option<f64> {
        self.values.get(sensor).copied().flatten()
    }

    /// Whether the record carries the given field at all (possibly null).
    pub fn has(&self, sensor: &str) -> bool {
        self.values.contains_key(sensor)
    }

    /// Set a sensor value (null when `value` is `None`).
    pub fn set(&mut self, sensor: impl Into<String>, value: Option<f64>) {
        self.values.insert(sensor.into(), value);
    }

    /// The record's Unix epoch timestamp, if present.
    pub fn timestamp(&self) -> Option<f64> {
        self.get(TIMESTAMP_FIELD)
    }

    /// Iterate over `(sensor, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sensor names carried by this record, in name order.
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record carries no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A copy of this record restricted to the named sensors.
    pub fn select(&self, sensors: &[String]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(k, _)| sensors.iter().any(|s| s == *k))
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}

impl FromIterator<(String, Option<f64>)> for SensorRecord {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// One device's one day of sensing: a date label plus the ordered sequence
/// of records as received from the data source.
///
/// Records are in non-decreasing original-timestamp order as received, but
/// timestamps may repeat, be missing, or be irregularly spaced; no spacing
/// invariant holds on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyDay {
    /// The calendar day, serialized as `YYYY-MM-DD`.
    #[serde(with = "day_label")]
    pub date: Date,
    /// The day's records, in received order.
    #[serde(rename = "energy_data", default)]
    pub records: Vec<SensorRecord>,
}

impl EnergyDay {
    /// Create a day with no records.
    pub fn empty(date: Date) -> Self {
        Self {
            date,
            records: Vec::new(),
        }
    }

    /// Whether the day carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A copy with each record restricted to the named sensors.
    pub fn select(&self, sensors: &[String]) -> Self {
        Self {
            date: self.date,
            records: self.records.iter().map(|r| r.select(sensors)).collect(),
        }
    }
}

/// Serde helpers for `YYYY-MM-DD` date labels.
pub mod day_label {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use time::Date;
    use time::macros::format_description;

    const FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let label = date.format(&FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&label)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let label = String::deserialize(deserializer)?;
        Date::parse(&label, &FORMAT).map_err(de::Error::custom)
    }
}

/// Format a date as its `YYYY-MM-DD` label.
pub fn format_day(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    // The ISO layout cannot fail to format for any representable Date.
    date.format(&format).unwrap_or_default()
}

/// Parse a day label: `YYYY-MM-DD`, or the aliases `today` / `yesterday`
/// resolved against the supplied current date.
pub fn parse_day(label: &str, today: Date) -> ParseResult<Date> {
    match label.to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today.previous_day().ok_or_else(|| {
            ParseError::InvalidDate(label.to_string())
        })?),
        _ => {
            let format = format_description!("[year]-[month]-[day]");
            Date::parse(label, &format).map_err(|_| ParseError::InvalidDate(label.to_string()))
        }
    }
}
