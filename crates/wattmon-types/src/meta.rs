//! Per-device household metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Household metadata for one device: a free-form JSON object holding
/// appliance presence flags, calibration ceilings (`max_scale_*`), home
/// size, and whatever else the installation recorded.
///
/// Fields are dynamically typed at the source, so lookups normalize: a flag
/// may be stored as a bool, a number, or a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: Map<String, Value>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw field access.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether the field exists and is not the literal string `"null"`.
    pub fn has(&self, field: &str) -> bool {
        match self.fields.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => s != "null",
            Some(_) => true,
        }
    }

    /// Whether the field holds a truthy value: `true`, a nonzero number, or
    /// a non-empty string other than `"null"` / `"false"` / `"0"`.
    pub fn truthy(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => {
                !s.is_empty() && s != "null" && s != "false" && s != "0"
            }
            _ => false,
        }
    }

    /// Numeric field access, accepting numbers and numeric strings.
    pub fn f64(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Iterate over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
