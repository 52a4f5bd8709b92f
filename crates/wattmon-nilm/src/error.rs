//! Error types for the NILM pipeline.

use thiserror::Error;

use crate::appliance::Appliance;

/// Result type for wattmon-nilm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the regularization and disaggregation pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Regularization was given no timestamped records, so no calendar day
    /// can be inferred. Non-recoverable for that call; the caller must skip
    /// the device/day.
    #[error("no timestamped records: cannot infer the day to regularize")]
    EmptyInput,

    /// An appliance was requested without a calibration ceiling. This is a
    /// configuration defect, raised before any model invocation.
    #[error("missing `{}` metadata for appliance `{}`", .appliance.scale_key(), .appliance.label())]
    MissingScaleMetadata { appliance: Appliance },

    /// The external model runner failed, returned incomplete output, or
    /// produced data whose shape does not line up with the input. Fatal for
    /// the device/day; never retried.
    #[error("disaggregation failed: {0}")]
    DisaggregationFailed(String),

    /// A record timestamp is outside the representable datetime range.
    #[error("timestamp out of range: {0}")]
    TimestampRange(#[from] time::error::ComponentRange),

    /// CSV error while writing the model input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while writing the model input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
