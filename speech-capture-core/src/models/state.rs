use std::fmt;

/// Recording session state machine.
///
/// Legal transitions:
/// ```text
/// Invalid|Done → Initialized → FilePathSet → Prepared → Recording → Stopped
///                                                                     ↓
///                          Done ← ConvertedToCompressed ← ConvertingToCompressed
/// ```
/// Any other requested transition forces `Invalid`. `Assessing` and `Result`
/// are reserved for a future scoring step and are never entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Invalid,
    Uninitialized,
    Initialized,
    FilePathSet,
    Prepared,
    Recording,
    Stopped,
    ConvertingToCompressed,
    ConvertedToCompressed,
    Done,
    Assessing,
    Result,
}

impl SessionState {
    /// Name used as the `StateChange` event message.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Uninitialized => "Uninitialized",
            Self::Initialized => "Initialized",
            Self::FilePathSet => "FilePathSet",
            Self::Prepared => "Prepared",
            Self::Recording => "Recording",
            Self::Stopped => "Stopped",
            Self::ConvertingToCompressed => "ConvertingToCompressed",
            Self::ConvertedToCompressed => "ConvertedToCompressed",
            Self::Done => "Done",
            Self::Assessing => "Assessing",
            Self::Result => "Result",
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// States from which `initialize` is accepted.
    pub fn can_initialize(&self) -> bool {
        matches!(self, Self::Invalid | Self::Done)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a recording left the `Recording` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The host called `stop_recording`.
    Host,
    /// The configured duration cap elapsed.
    DurationElapsed,
    /// The analyzer reported the end of speech.
    SpeechEnded,
    /// A representative sample exceeded the clipping threshold.
    Clipping,
    /// Appending to the raw file failed.
    WriteFailed,
    /// An out-of-order operation forced the session to `Invalid`.
    Invalidated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_accepted_only_from_invalid_or_done() {
        assert!(SessionState::Invalid.can_initialize());
        assert!(SessionState::Done.can_initialize());
        assert!(!SessionState::Initialized.can_initialize());
        assert!(!SessionState::Recording.can_initialize());
        assert!(!SessionState::ConvertingToCompressed.can_initialize());
    }

    #[test]
    fn display_matches_event_name() {
        assert_eq!(SessionState::ConvertedToCompressed.to_string(), "ConvertedToCompressed");
        assert_eq!(SessionState::FilePathSet.name(), "FilePathSet");
    }
}
