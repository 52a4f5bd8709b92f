//! Error types for data parsing in wattmon-types.

use thiserror::Error;

/// Errors that can occur when parsing energy-monitoring data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A date label was not `YYYY-MM-DD` or a recognized alias.
    #[error("Invalid date `{0}`: expected YYYY-MM-DD, `today` or `yesterday`")]
    InvalidDate(String),
}

/// Result type alias using wattmon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
