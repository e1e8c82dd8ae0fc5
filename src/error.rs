//! Gate error taxonomy
//!
//! Every infrastructure failure the gate can hit maps onto one variant here,
//! and every variant maps onto a distinct non-zero exit code.

use std::time::Duration;
use thiserror::Error;

/// Exit code for a completed gate whose thresholds passed
pub const EXIT_PASSED: i32 = 0;

/// Exit code for a threshold breach or a run the backend reported as failed
pub const EXIT_FAILED: i32 = 1;

/// Errors surfaced by the gate
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Load test backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed backend response: {message}")]
    MalformedResponse { message: String, payload: String },

    #[error("Run did not reach a terminal state within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Wait cancelled before the run finished")]
    Cancelled,

    #[error("Target endpoint unreachable: {0}")]
    TargetUnreachable(String),
}

impl GateError {
    pub fn config(message: impl Into<String>) -> Self {
        GateError::ConfigInvalid(message.into())
    }

    pub fn malformed(message: impl Into<String>, payload: impl Into<String>) -> Self {
        GateError::MalformedResponse {
            message: message.into(),
            payload: payload.into(),
        }
    }

    /// Short stable name, used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::ConfigInvalid(_) => "config_invalid",
            GateError::BackendUnavailable(_) => "backend_unavailable",
            GateError::MalformedResponse { .. } => "malformed_response",
            GateError::Timeout(_) => "timeout",
            GateError::Cancelled => "cancelled",
            GateError::TargetUnreachable(_) => "target_unreachable",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::ConfigInvalid(_) => 2,
            GateError::BackendUnavailable(_) => 3,
            GateError::MalformedResponse { .. } => 4,
            GateError::Timeout(_) => 5,
            GateError::Cancelled => 6,
            GateError::TargetUnreachable(_) => 7,
        }
    }
}
