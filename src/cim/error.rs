//! errors raised while validating a configuration into a [`Design`](super::config::Design)

use thiserror::Error;

/// fatal configuration problems, nothing is simulated once one of these is raised
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("technology node {node}nm is not supported")]
    UnsupportedTechNode { node: u32 },

    #[error("transistor kind {kind} is not supported")]
    UnsupportedTransistor { kind: String },

    #[error("access device {access} cannot be used with {cell} cells")]
    UnsupportedAccess { access: String, cell: String },

    #[error("{what} must be positive, got {value}")]
    NonPositiveCapacity { what: &'static str, value: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub fn capacity(what: &'static str, value: usize) -> Self {
        Self::NonPositiveCapacity { what, value }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// reject a non-finite or non-positive physical quantity
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            name,
            format!("expected a positive finite value, got {value}"),
        ))
    }
}

/// reject a zero count
pub(crate) fn ensure_nonzero(what: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        Err(ConfigError::capacity(what, value))
    } else {
        Ok(value)
    }
}
