use thiserror::Error;

use crate::levers::LeverKind;

/// Failures raised while building or running a scenario.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmissionsError {
    /// The scenario inputs do not resolve against the reference data.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A lever asked for more than 100% of the category total it operates on.
    #[error("{lever} requested {requested:.6} of its operating total, which exceeds 100%")]
    ConservationViolation { lever: LeverKind, requested: f64 },
    #[error("{lever} parameter {parameter} must be a finite, non-negative number, got {value}")]
    InvalidLeverParameter {
        lever: LeverKind,
        parameter: &'static str,
        value: f64,
    },
    /// A divisor the projection depends on is zero, negative or not finite.
    #[error("numeric degeneracy in {year}: {quantity} is {value}")]
    NumericDegeneracy {
        year: u16,
        quantity: &'static str,
        value: f64,
    },
}

impl EmissionsError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        EmissionsError::Configuration(message.into())
    }
}
