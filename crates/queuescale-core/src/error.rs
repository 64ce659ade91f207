//! Error types shared by the queuescale crates.

use thiserror::Error;

/// Result type alias for control-loop operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors that can occur while inspecting or resizing a fleet.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("fleet \"{0}\" not found")]
    FleetNotFound(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("fleet manager error: {0}")]
    Fleet(String),

    #[error("invalid shutdown request: {0}")]
    InvalidMember(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScaleError {
    /// Configuration errors abort the invocation and are never worth retrying.
    pub fn is_config(&self) -> bool {
        matches!(self, ScaleError::FleetNotFound(_) | ScaleError::Config(_))
    }
}
