//! Error taxonomy for remote Drive calls

use thiserror::Error;

/// Result type for listing and mutation calls.
pub type DriveResult<T> = Result<T, DriveError>;

/// Failure of a single remote call, or a replicator-side rejection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriveError {
    /// Network, connection or response decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Missing/invalid credentials or a token lacking the required scope.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    /// Referenced file or folder id does not exist (or is not visible).
    #[error("not found: {message}")]
    NotFound { message: String },
    /// Any other remote-side failure (quota, rate limit, invalid argument).
    #[error("provider error {status} {reason}: {message}")]
    Provider {
        status: u16,
        reason: String,
        message: String,
    },
    /// Source folder is its own ancestor.
    #[error("folder {0} already appears among its ancestors")]
    Cycle(String),
    #[error("depth limit of {0} exceeded")]
    DepthExceeded(usize),
    /// The run was cancelled before this call was issued.
    #[error("cancelled before the call was issued")]
    Cancelled,
}

impl DriveError {
    /// Authorization failures stop the whole run, not just the branch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriveError::Unauthorized { .. })
    }

    /// Short machine-friendly tag used in log lines and the JSONL report.
    pub fn kind(&self) -> &'static str {
        match self {
            DriveError::Transport(_) => "transport",
            DriveError::Unauthorized { .. } => "unauthorized",
            DriveError::NotFound { .. } => "not_found",
            DriveError::Provider { .. } => "provider",
            DriveError::Cycle(_) => "cycle",
            DriveError::DepthExceeded(_) => "depth_exceeded",
            DriveError::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(e: reqwest::Error) -> Self {
        DriveError::Transport(e.to_string())
    }
}
