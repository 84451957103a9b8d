//! Configuration errors, raised before any simulation starts.

use thiserror::Error;

/// A strategy or model configuration that cannot be run.
///
/// Produced by validation and compilation; a strategy that yields any of
/// these is never partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown indicator '{0}' referenced by a signal condition")]
    UnknownIndicator(String),

    #[error("indicator '{indicator}' has no field '{field}' (available: {available})")]
    UnknownField {
        indicator: String,
        field: String,
        available: String,
    },

    #[error("indicator alias '{0}' declared more than once")]
    DuplicateIndicator(String),

    #[error("invalid {component} parameter: {message}")]
    InvalidParameter {
        component: &'static str,
        message: String,
    },

    #[error("malformed signal group: {0}")]
    MalformedSignalGroup(String),

    #[error("invalid execution model: {0}")]
    InvalidExecutionModel(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub(crate) fn param(component: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            component,
            message: message.into(),
        }
    }
}
