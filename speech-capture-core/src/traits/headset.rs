use std::sync::Arc;

/// Raw headset plug notification as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadsetPlug {
    pub plugged: bool,
    pub has_microphone: bool,
}

impl HeadsetPlug {
    /// A headset only counts as connected when it also carries a microphone.
    pub fn is_connected(&self) -> bool {
        self.plugged && self.has_microphone
    }
}

/// Receives every plug change while registered.
pub type HeadsetCallback = Arc<dyn Fn(HeadsetPlug) + Send + Sync + 'static>;

/// Source of headset plug/unplug notifications.
pub trait HeadsetMonitor: Send + Sync {
    fn register(&self, callback: HeadsetCallback);

    fn unregister(&self);
}
