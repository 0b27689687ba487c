/// Per-frame signal analysis used by the capture loop.
///
/// Implementations may keep internal state across calls (noise floor, spurt
/// counters); `reset` is called at the start of every recording.
pub trait SignalAnalyzer: Send {
    /// Reduce one captured frame to a single representative value.
    fn representative_sample(&mut self, frame: &[i16]) -> i16;

    /// Given all representative values so far, report whether speech started.
    fn speech_started(&mut self, history: &[i16]) -> bool;

    /// Given all representative values so far, report whether speech ended.
    fn speech_stopped(&mut self, history: &[i16]) -> bool;

    fn reset(&mut self) {}
}
