use thiserror::Error;

/// Status code for a successful call.
pub const SUCCESS: i32 = 0;

/// Errors that can occur during focus arbitration and session operations.
///
/// Policy outcomes (`Rejected`) are ordinary values, not faults. Every variant
/// maps to a stable negative status code so it can cross a process boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FocusError {
    #[error("focus request rejected by policy")]
    Rejected,

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("too many stream instances")]
    Overflow,

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("policy service died")]
    ServiceDied,

    #[error("timeout")]
    Timeout,
}

impl FocusError {
    /// Signed 32-bit status code for this error. Never returns `SUCCESS`.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Operation(_) => -1,
            Self::IllegalState(_) => -2,
            Self::InvalidParam(_) => -3,
            Self::Overflow => -4,
            Self::Rejected => -5,
            Self::PermissionDenied => -6,
            Self::ServiceDied => -7,
            Self::Timeout => -8,
        }
    }

    /// Rebuild an error from a status code and message received from a peer.
    ///
    /// Returns `None` for `SUCCESS`. Unknown negative codes become `Operation`.
    pub fn from_status(code: i32, message: &str) -> Option<Self> {
        let err = match code {
            SUCCESS => return None,
            -2 => Self::IllegalState(message.to_string()),
            -3 => Self::InvalidParam(message.to_string()),
            -4 => Self::Overflow,
            -5 => Self::Rejected,
            -6 => Self::PermissionDenied,
            -7 => Self::ServiceDied,
            -8 => Self::Timeout,
            _ => Self::Operation(message.to_string()),
        };
        Some(err)
    }

    /// Whether this error came from a policy decision rather than a fault.
    pub fn is_policy_decision(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Convert a call result into its status code.
pub fn status_of<T>(result: &Result<T, FocusError>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.status_code(),
    }
}
