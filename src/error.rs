//! Error types for Disha

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Disha error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unparseable device line or CSV row
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Vector or batch with the wrong number of elements
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected element count (or row width)
        expected: usize,
        /// Actual element count
        actual: usize,
    },

    /// NaN/Inf in the filter state, or a covariance that is no longer
    /// symmetric positive semi-definite. The trial must be restarted.
    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
