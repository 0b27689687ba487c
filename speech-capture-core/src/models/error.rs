use thiserror::Error;

/// Hint attached to permission failures so hosts know what to show the user.
pub const PERMISSION_RECOVERY_SUGGESTION: &str = "Show permission dialog to user";

/// Hint for failures that have no known user-facing fix.
pub const DEFAULT_RECOVERY_SUGGESTION: &str =
    "Sorry, we don't have a suggested fix for this error yet.";

/// Errors raised by the recorder.
///
/// Illegal state transitions are deliberately absent: they are absorbed into
/// `SessionState::Invalid` and reported through `StateChange` events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("permissions required for recording not granted")]
    PermissionDenied { recovery_suggestion: String },

    #[error("failed to initialize capture device: {0}")]
    DeviceInit(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("muxing failed: {0}")]
    Muxing(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("transcode cancelled")]
    Cancelled,
}

impl RecorderError {
    pub fn permission_denied() -> Self {
        Self::PermissionDenied {
            recovery_suggestion: PERMISSION_RECOVERY_SUGGESTION.to_string(),
        }
    }

    /// What the host should do about this error.
    pub fn recovery_suggestion(&self) -> &str {
        match self {
            Self::PermissionDenied { recovery_suggestion } => recovery_suggestion,
            Self::DeviceInit(_) => "Close other applications using the microphone and initialize again",
            _ => DEFAULT_RECOVERY_SUGGESTION,
        }
    }
}
