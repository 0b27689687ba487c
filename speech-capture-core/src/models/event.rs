use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Kind of a [`RecordingEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Duration,
    StateChange,
    HeadsetPlug,
}

/// Message delivered to the host listener.
///
/// Messages are `"MM : SS"` for `Duration`, the state name for
/// `StateChange` and `"true"`/`"false"` for `HeadsetPlug`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingEvent {
    pub kind: EventKind,
    pub message: String,
}

impl RecordingEvent {
    pub fn duration(elapsed_secs: u32) -> Self {
        Self {
            kind: EventKind::Duration,
            message: format_elapsed(elapsed_secs),
        }
    }

    pub fn state_change(state: SessionState) -> Self {
        Self {
            kind: EventKind::StateChange,
            message: state.name().to_string(),
        }
    }

    pub fn headset_plug(connected: bool) -> Self {
        Self {
            kind: EventKind::HeadsetPlug,
            message: connected.to_string(),
        }
    }
}

/// Format elapsed seconds as `MM : SS`.
pub fn format_elapsed(elapsed_secs: u32) -> String {
    format!("{:02} : {:02}", elapsed_secs / 60, elapsed_secs % 60)
}
