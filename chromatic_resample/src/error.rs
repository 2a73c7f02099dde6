//! Error types for resampling runs
//!
//! Every failure the engine can produce is a deterministic function of its
//! input, so none of these errors are retried internally. They are all
//! surfaced to the caller.

use thiserror::Error;

use crate::measurement::SampleId;

/// Result type alias for resampling operations
pub type ResampleResult<T> = Result<T, ResampleError>;

/// Error type shared by grouping, resampling and assembly
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResampleError {
    /// Schema or shape violation in the input records
    #[error("Malformed input: {details}")]
    MalformedInput { details: String },

    /// Too few distinct points for the requested interpolation kind
    #[error(
        "Insufficient data for sample '{sample}': {kind} interpolation needs at least {required} distinct points, got {got}"
    )]
    InsufficientData {
        sample: String,
        kind: String,
        required: usize,
        got: usize,
    },

    /// Numeric fitting failure
    #[error("Interpolation failed for sample '{sample}' ({context}): {details}")]
    Interpolation {
        sample: String,
        context: String,
        details: String,
    },

    /// Invalid rounding precision
    #[error("Invalid precision {value}: {reason}")]
    PrecisionConfig { value: i64, reason: String },
}

impl ResampleError {
    /// Create a malformed input error
    pub fn malformed(details: impl Into<String>) -> Self {
        ResampleError::MalformedInput {
            details: details.into(),
        }
    }

    /// Create an insufficient data error
    pub fn insufficient_data(
        sample: &SampleId,
        kind: impl Into<String>,
        required: usize,
        got: usize,
    ) -> Self {
        ResampleError::InsufficientData {
            sample: sample.to_string(),
            kind: kind.into(),
            required,
            got,
        }
    }

    /// Create an interpolation error
    pub fn interpolation(
        sample: &SampleId,
        context: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ResampleError::Interpolation {
            sample: sample.to_string(),
            context: context.into(),
            details: details.into(),
        }
    }

    /// Create a precision configuration error
    pub fn precision(value: i64, reason: impl Into<String>) -> Self {
        ResampleError::PrecisionConfig {
            value,
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in run logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResampleError::MalformedInput { .. } => "malformed_input",
            ResampleError::InsufficientData { .. } => "insufficient_data",
            ResampleError::Interpolation { .. } => "interpolation",
            ResampleError::PrecisionConfig { .. } => "precision_config",
        }
    }
}
