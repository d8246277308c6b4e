//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
///
/// Any of these aborts a check before it touches the registry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("invalid blacklist pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("overload coefficient must be a finite number >= 1, got {0}")]
    InvalidOverloadCoef(f64),

    #[error("threshold {0} must be a finite number")]
    InvalidThreshold(&'static str),
}
