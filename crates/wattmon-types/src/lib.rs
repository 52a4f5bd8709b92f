//! Shared data model for wattmon energy monitoring.
//!
//! This crate provides the types exchanged between the document-store
//! adapter, the NILM pipeline, and the HTTP service.
//!
//! # Features
//!
//! - [`SensorRecord`]: one timestamped observation (sensor name → value)
//! - [`EnergyDay`]: one device's one day of records, with its date label
//! - [`Metadata`]: per-device household metadata (appliance flags,
//!   calibration ceilings)
//! - Date-label parsing with `today` / `yesterday` aliases
//!
//! # Example
//!
//! ```
//! use wattmon_types::{EnergyDay, SensorRecord};
//!
//! let json = r#"{"date":"2024-03-01","energy_data":[{"timestamp":1709251205.0,"power":412.0}]}"#;
//! let day: EnergyDay = serde_json::from_str(json).unwrap();
//! assert_eq!(day.records[0].get("power"), Some(412.0));
//! ```

pub mod error;
pub mod meta;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use meta::Metadata;
pub use types::{
    EnergyDay, KWH_FIELD, ORIGINAL_TIMESTAMP_FIELD, POWER_FIELD, SensorRecord, TIMESTAMP_FIELD,
    format_day, parse_day,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    // --- SensorRecord tests ---

    #[test]
    fn test_record_get_flattens_null_and_missing() {
        let record: SensorRecord =
            serde_json::from_value(json!({"power": 350.5, "kwh": null})).unwrap();

        assert_eq!(record.get("power"), Some(350.5));
        assert_eq!(record.get("kwh"), None);
        assert_eq!(record.get("voltage"), None);
        assert!(record.has("kwh"));
        assert!(!record.has("voltage"));
    }

    #[test]
    fn test_record_timestamp() {
        let record: SensorRecord =
            serde_json::from_value(json!({"timestamp": 1709251200.4, "power": 100.0})).unwrap();
        assert_eq!(record.timestamp(), Some(1709251200.4));

        let record = SensorRecord::new();
        assert_eq!(record.timestamp(), None);
    }

    #[test]
    fn test_record_set_and_len() {
        let mut record = SensorRecord::new();
        assert!(record.is_empty());

        record.set("power", Some(42.0));
        record.set("kwh", None);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("power"), Some(42.0));
        assert_eq!(record.get("kwh"), None);
        assert!(record.has("kwh"));
    }

    #[test]
    fn test_record_select() {
        let record: SensorRecord =
            serde_json::from_value(json!({"timestamp": 1.0, "power": 2.0, "voltage": 3.0}))
                .unwrap();

        let selected = record.select(&["power".to_string(), "timestamp".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.get("power"), Some(2.0));
        assert!(!selected.has("voltage"));
    }

    #[test]
    fn test_record_serialization_preserves_null() {
        let mut record = SensorRecord::new();
        record.set("power", None);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"power":null}"#);
    }

    #[test]
    fn test_record_iter_in_name_order() {
        let record: SensorRecord =
            serde_json::from_value(json!({"b": 2.0, "a": 1.0, "c": null})).unwrap();

        let names: Vec<&str> = record.sensors().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    // --- EnergyDay tests ---

    #[test]
    fn test_energy_day_roundtrip() {
        let json = r#"{"date":"2024-03-01","energy_data":[{"timestamp":1709251205.0,"power":412.0,"kwh":null}]}"#;
        let day: EnergyDay = serde_json::from_str(json).unwrap();

        assert_eq!(day.date, date!(2024 - 03 - 01));
        assert_eq!(day.records.len(), 1);
        assert_eq!(day.records[0].get("power"), Some(412.0));

        let out = serde_json::to_value(&day).unwrap();
        assert_eq!(out["date"], "2024-03-01");
        assert!(out["energy_data"].is_array());
    }

    #[test]
    fn test_energy_day_missing_records_defaults_empty() {
        let day: EnergyDay = serde_json::from_str(r#"{"date":"2024-03-01"}"#).unwrap();
        assert!(day.is_empty());
    }

    #[test]
    fn test_energy_day_bad_date_rejected() {
        let result: Result<EnergyDay, _> =
            serde_json::from_str(r#"{"date":"03/01/2024","energy_data":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_energy_day_select() {
        let json = r#"{"date":"2024-03-01","energy_data":[
            {"timestamp":1.0,"power":10.0,"voltage":230.0},
            {"timestamp":2.0,"power":20.0,"voltage":231.0}]}"#;
        let day: EnergyDay = serde_json::from_str(json).unwrap();

        let selected = day.select(&["power".to_string()]);
        assert_eq!(selected.records.len(), 2);
        assert!(!selected.records[0].has("voltage"));
        assert_eq!(selected.records[1].get("power"), Some(20.0));
    }

    // --- Date label tests ---

    #[test]
    fn test_parse_day_iso() {
        let today = date!(2024 - 03 - 15);
        assert_eq!(parse_day("2024-02-29", today).unwrap(), date!(2024 - 02 - 29));
    }

    #[test]
    fn test_parse_day_aliases() {
        let today = date!(2024 - 03 - 01);
        assert_eq!(parse_day("today", today).unwrap(), today);
        assert_eq!(parse_day("TODAY", today).unwrap(), today);
        assert_eq!(parse_day("yesterday", today).unwrap(), date!(2024 - 02 - 29));
    }

    #[test]
    fn test_parse_day_invalid() {
        let today = date!(2024 - 03 - 01);
        assert!(parse_day("not-a-date", today).is_err());
        assert!(parse_day("2024-13-01", today).is_err());
        assert!(parse_day("", today).is_err());
    }

    #[test]
    fn test_format_day() {
        assert_eq!(format_day(date!(2024 - 03 - 01)), "2024-03-01");
        assert_eq!(format_day(date!(1999 - 12 - 31)), "1999-12-31");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::InvalidDate("junk".to_string());
        assert!(err.to_string().contains("junk"));
    }

    // --- Metadata tests ---

    #[test]
    fn test_metadata_truthy() {
        let meta: Metadata = serde_json::from_value(json!({
            "fridge": true,
            "bulb": false,
            "kettle": 1,
            "oven": 0,
            "microwave": "yes",
            "dish_washer": "false",
            "washing_machine": "null",
            "computer": "",
            "tumble_dryer": null,
        }))
        .unwrap();

        assert!(meta.truthy("fridge"));
        assert!(!meta.truthy("bulb"));
        assert!(meta.truthy("kettle"));
        assert!(!meta.truthy("oven"));
        assert!(meta.truthy("microwave"));
        assert!(!meta.truthy("dish_washer"));
        assert!(!meta.truthy("washing_machine"));
        assert!(!meta.truthy("computer"));
        assert!(!meta.truthy("tumble_dryer"));
        assert!(!meta.truthy("absent"));
    }

    #[test]
    fn test_metadata_has_excludes_null_string() {
        let meta: Metadata = serde_json::from_value(json!({
            "size": 85.0,
            "floor": "null",
            "rooms": null,
        }))
        .unwrap();

        assert!(meta.has("size"));
        assert!(!meta.has("floor"));
        assert!(!meta.has("rooms"));
        assert!(!meta.has("absent"));
    }

    #[test]
    fn test_metadata_f64_accepts_numeric_strings() {
        let meta: Metadata = serde_json::from_value(json!({
            "max_scale_fridge": 250.0,
            "size": "85.5",
            "name": "house-7",
        }))
        .unwrap();

        assert_eq!(meta.f64("max_scale_fridge"), Some(250.0));
        assert_eq!(meta.f64("size"), Some(85.5));
        assert_eq!(meta.f64("name"), None);
        assert_eq!(meta.f64("absent"), None);
    }

    #[test]
    fn test_metadata_set_and_iter() {
        let mut meta = Metadata::new();
        assert!(meta.is_empty());

        meta.set("size", json!(120));
        meta.set("fridge", json!(true));

        assert_eq!(meta.len(), 2);
        assert_eq!(meta.f64("size"), Some(120.0));
        let fields: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert!(fields.contains(&"size"));
        assert!(fields.contains(&"fridge"));
    }

    #[test]
    fn test_metadata_transparent_serialization() {
        let meta: Metadata = serde_json::from_value(json!({"size": 85})).unwrap();
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"size":85}"#);
    }

    // --- Property tests ---

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn day_label_roundtrips(year in 2000i32..2100, ordinal in 1u16..=365) {
                let date = time::Date::from_ordinal_date(year, ordinal).unwrap();
                let label = format_day(date);
                let parsed = parse_day(&label, date).unwrap();
                prop_assert_eq!(parsed, date);
            }

            #[test]
            fn record_json_roundtrips(power in proptest::option::of(-1e6f64..1e6)) {
                let mut record = SensorRecord::new();
                record.set("power", power);
                let json = serde_json::to_string(&record).unwrap();
                let back: SensorRecord = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(back, record);
            }
        }
    }
}
