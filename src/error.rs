//! Error types for the accelerated integrators and their collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmdError {
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no boosted term configured: {0}")]
    EmptyBoost(&'static str),

    #[error("operation not supported by this integrator: {0}")]
    Unsupported(&'static str),

    #[error("constraints did not converge after {iterations} iterations (max error {max_error:e})")]
    ConstraintNotConverged { iterations: usize, max_error: f64 },

    #[error("cannot write '{suffix}' file: compression support was not compiled in")]
    CompressionUnavailable { suffix: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AmdError>;

/// Reject non-positive (or non-finite) values for parameters that must be strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AmdError::InvalidParameter {
            name,
            value,
            reason: "must be finite and positive",
        })
    }
}

pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AmdError::InvalidParameter {
            name,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AmdError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

pub(crate) fn require_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(AmdError::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}
