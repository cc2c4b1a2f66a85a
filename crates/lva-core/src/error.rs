//! Error types for lva-core

use thiserror::Error;

/// Result type alias for lva-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lva-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// Operator catalog entry rejected at load time
    #[error("invalid operator '{operator}': {message}")]
    InvalidOperator {
        /// Name of the operator with the error
        operator: String,
        /// Description of the error
        message: String,
    },

    /// Attribute value could not be parsed as the requested type
    #[error("cannot parse '{value}' as {expected}")]
    InvalidAttributeValue {
        /// Raw text that failed to parse
        value: String,
        /// Expected attribute type
        expected: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
