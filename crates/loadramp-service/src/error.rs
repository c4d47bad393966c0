//! Error types for ramp execution and the service facade.

use loadramp_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Why a step was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The ramp deadline lapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => f.write_str("run cancelled"),
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Failure of one ramp invocation. Steps are numbered from 1.
#[derive(Debug, Error)]
pub enum RampError {
    /// Invalid ramp parameters, detected before any step runs.
    #[error("invalid ramp configuration: {0}")]
    Configuration(String),

    /// The ramp was interrupted before or between steps.
    #[error("executing the step #{step} of the plan: {cause}")]
    Cancelled { step: usize, cause: CancelCause },

    /// The driver produced a report that could not be decoded.
    #[error("decoding the results of the step #{step}: {source}")]
    Decode {
        step: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl RampError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Step the error is attributed to, when it happened while stepping.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Configuration(_) => None,
            Self::Cancelled { step, .. } | Self::Decode { step, .. } => Some(*step),
        }
    }
}

impl From<CoreError> for RampError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => Self::Configuration(msg),
            other => Self::Configuration(other.to_string()),
        }
    }
}

/// Stage-tagged failure returned by [`crate::RampService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("executing the plan: {0}")]
    Execute(#[from] RampError),

    #[error("encoding the report: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("storing the results: {0}")]
    Store(#[source] CoreError),

    #[error("loading the results: {0}")]
    Load(#[source] CoreError),
}

impl ServiceError {
    /// True when the requested run does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Load(err) if err.is_not_found())
    }

    /// True when the caller supplied an invalid plan.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Execute(err) if err.is_configuration())
    }
}
