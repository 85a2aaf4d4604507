//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
///
/// Only setup-time conditions are errors. Per-step saturation (spawn requests
/// exceeding the free list) is silent by contract and never produces one.
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("GPU adapter not found")]
    AdapterNotFound,

    #[error("GPU device error: {0}")]
    DeviceError(String),

    #[error("Buffer readback failed: {0}")]
    ReadbackFailed(String),

    #[error("Pool invariant violated: {0}")]
    PoolCorrupted(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for EmberError {
    fn from(err: toml::ser::Error) -> Self {
        EmberError::TomlSerError(err.to_string())
    }
}
