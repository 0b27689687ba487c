use crate::models::event::RecordingEvent;

/// Host-side receiver for recorder events.
///
/// Called from whichever thread produced the event (control caller, capture
/// thread, ticker or transcode thread). Implementations should marshal to a
/// UI thread themselves.
pub trait RecordingListener: Send + Sync {
    fn on_recording_event(&self, event: &RecordingEvent);
}

impl<F> RecordingListener for F
where
    F: Fn(&RecordingEvent) + Send + Sync,
{
    fn on_recording_event(&self, event: &RecordingEvent) {
        self(event)
    }
}
