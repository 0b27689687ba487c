//! Test doubles for the platform collaborators.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::RecorderError;
use crate::models::event::{EventKind, RecordingEvent};
use crate::traits::capture_device::{CaptureBackend, CaptureDevice};
use crate::traits::encoder::{
    AudioEncoder, BufferFlags, BufferInfo, EncoderConfig, MediaMuxer, OutputStatus, TrackFormat,
    TranscoderBackend, AAC_MIME_TYPE,
};
use crate::traits::headset::{HeadsetCallback, HeadsetMonitor, HeadsetPlug};
use crate::traits::listener::RecordingListener;
use crate::traits::permission::PermissionSource;
use crate::traits::signal_analyzer::SignalAnalyzer;

// --- capture ---

#[derive(Default)]
pub struct DeviceProbe {
    pub opened: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub reads: AtomicUsize,
}

/// Device that produces a constant-valued frame every couple of milliseconds.
/// A stalled device never delivers a frame; its reads block until stopped.
pub struct FakeDevice {
    value: i16,
    stalled: bool,
    running: AtomicBool,
    halted: AtomicBool,
    probe: Arc<DeviceProbe>,
}

impl CaptureDevice for FakeDevice {
    fn start(&self) -> Result<(), RecorderError> {
        self.running.store(true, Ordering::SeqCst);
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, buffer: &mut [i16]) -> Result<usize, RecorderError> {
        if self.stalled {
            while !self.halted.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            return Ok(0);
        }
        thread::sleep(Duration::from_millis(2));
        if !self.running.load(Ordering::SeqCst) {
            return Ok(0);
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        buffer.fill(self.value);
        Ok(buffer.len())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.halted.store(true, Ordering::SeqCst);
        self.probe.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeBackend {
    value: i16,
    fail: bool,
    stalled: bool,
    pub probe: Arc<DeviceProbe>,
}

impl FakeBackend {
    pub fn new(value: i16) -> Self {
        Self {
            value,
            fail: false,
            stalled: false,
            probe: Arc::new(DeviceProbe::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new(0)
        }
    }
}

impl CaptureBackend for FakeBackend {
    fn open_device(&self, _sample_rate: u32) -> Result<Arc<dyn CaptureDevice>, RecorderError> {
        if self.fail {
            return Err(RecorderError::DeviceInit("no capture endpoint".into()));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeDevice {
            value: self.value,
            stalled: self.stalled,
            running: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            probe: Arc::clone(&self.probe),
        }))
    }
}

pub struct FakePermission(pub AtomicBool);

impl FakePermission {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub fn set(&self, granted: bool) {
        self.0.store(granted, Ordering::SeqCst);
    }
}

impl PermissionSource for FakePermission {
    fn has_record_permission(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeHeadset {
    callback: Mutex<Option<HeadsetCallback>>,
    pub registrations: AtomicUsize,
}

impl FakeHeadset {
    pub fn plug(&self, plugged: bool, has_microphone: bool) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(HeadsetPlug { plugged, has_microphone });
        }
    }

    pub fn is_registered(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl HeadsetMonitor for FakeHeadset {
    fn register(&self, callback: HeadsetCallback) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock() = Some(callback);
    }

    fn unregister(&self) {
        *self.callback.lock() = None;
    }
}

#[derive(Default)]
pub struct AnalyzerProbe {
    pub start_queries: AtomicUsize,
    pub stop_queries: AtomicUsize,
    pub resets: AtomicUsize,
}

/// Analyzer returning a fixed representative value and signalling speech
/// boundaries after a set number of queries.
pub struct ScriptedAnalyzer {
    pub representative: i16,
    pub start_after: Option<usize>,
    pub stop_after: Option<usize>,
    pub probe: Arc<AnalyzerProbe>,
}

impl ScriptedAnalyzer {
    pub fn silent(representative: i16) -> Self {
        Self {
            representative,
            start_after: None,
            stop_after: None,
            probe: Arc::new(AnalyzerProbe::default()),
        }
    }
}

impl SignalAnalyzer for ScriptedAnalyzer {
    fn representative_sample(&mut self, _frame: &[i16]) -> i16 {
        self.representative
    }

    fn speech_started(&mut self, _history: &[i16]) -> bool {
        let n = self.probe.start_queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.start_after.is_some_and(|after| n >= after)
    }

    fn speech_stopped(&mut self, _history: &[i16]) -> bool {
        let n = self.probe.stop_queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.stop_after.is_some_and(|after| n >= after)
    }

    fn reset(&mut self) {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener that records every event.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<RecordingEvent>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<RecordingEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn states(&self) -> Vec<String> {
        self.messages(EventKind::StateChange)
    }

    /// Poll until `predicate` holds or `timeout` elapses.
    pub fn wait_for(&self, timeout: Duration, predicate: impl Fn(&[RecordingEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate(&self.events.lock()) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        predicate(&self.events.lock())
    }
}

impl RecordingListener for EventLog {
    fn on_recording_event(&self, event: &RecordingEvent) {
        self.events.lock().push(event.clone());
    }
}

// --- transcode ---

/// Extra statuses the fake encoder reports before its real output.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedStatus {
    BuffersChanged,
    TryAgainLater,
    Unknown(i32),
    /// A data buffer of the given size, ahead of any format negotiation.
    StrayBuffer(usize),
}

#[derive(Debug, Default)]
struct ProbeState {
    add_track_calls: usize,
    eos_outputs: usize,
    muxer_started: bool,
    wrote_before_start: bool,
    queued_chunks: Vec<usize>,
    queued_timestamps: Vec<i64>,
    eos_input_timestamp: Option<i64>,
    muxer_released: bool,
    config_buffers_written: usize,
}

#[derive(Clone, Default)]
pub struct TranscodeProbe(Arc<Mutex<ProbeState>>);

impl TranscodeProbe {
    pub fn add_track_calls(&self) -> usize {
        self.0.lock().add_track_calls
    }

    pub fn eos_outputs(&self) -> usize {
        self.0.lock().eos_outputs
    }

    pub fn muxer_started_before_first_write(&self) -> bool {
        let state = self.0.lock();
        state.muxer_started && !state.wrote_before_start
    }

    pub fn queued_chunks(&self) -> Vec<usize> {
        self.0.lock().queued_chunks.clone()
    }

    pub fn queued_timestamps(&self) -> Vec<i64> {
        self.0.lock().queued_timestamps.clone()
    }

    pub fn eos_input_timestamp(&self) -> Option<i64> {
        self.0.lock().eos_input_timestamp
    }

    pub fn muxer_released(&self) -> bool {
        self.0.lock().muxer_released
    }

    pub fn config_buffers_written(&self) -> usize {
        self.0.lock().config_buffers_written
    }
}

/// Pass-through "encoder": every input chunk comes back as one output
/// buffer. Holds at most two undrained inputs, like a small hardware queue.
struct FakeEncoder {
    probe: TranscodeProbe,
    injected: VecDeque<ScriptedStatus>,
    pending: VecDeque<OutputStatus>,
    slots: Vec<Vec<u8>>,
    format_sent: bool,
    in_flight: usize,
    delay: Duration,
    config_on_eos: bool,
    fail_start: bool,
}

const FAKE_INPUT_CAPACITY: usize = 64 * 1024;
const FAKE_QUEUE_DEPTH: usize = 2;

impl FakeEncoder {
    fn push_output(&mut self, data: Vec<u8>, presentation_time_us: i64, flags: BufferFlags) {
        let index = self.slots.len();
        let info = BufferInfo {
            offset: 0,
            size: data.len(),
            presentation_time_us,
            flags,
        };
        self.slots.push(data);
        self.pending.push_back(OutputStatus::Buffer { index, info });
    }
}

impl AudioEncoder for FakeEncoder {
    fn start(&mut self) -> Result<(), RecorderError> {
        if self.fail_start {
            return Err(RecorderError::Encoding("codec refused to start".into()));
        }
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Option<usize> {
        (self.in_flight < FAKE_QUEUE_DEPTH).then_some(self.in_flight)
    }

    fn input_capacity(&self, _index: usize) -> usize {
        FAKE_INPUT_CAPACITY
    }

    fn queue_input_buffer(
        &mut self,
        _index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> Result<(), RecorderError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if !self.format_sent {
            self.format_sent = true;
            self.pending.push_back(OutputStatus::FormatChanged(TrackFormat {
                mime_type: AAC_MIME_TYPE.to_string(),
                sample_rate: 16_000,
                channels: 1,
                codec_specific_data: vec![0x14, 0x08],
            }));
            self.push_output(vec![0x14, 0x08], 0, BufferFlags::CODEC_CONFIG);
        }
        self.in_flight += 1;
        if flags.contains(BufferFlags::END_OF_STREAM) {
            self.probe.0.lock().eos_input_timestamp = Some(presentation_time_us);
            if self.config_on_eos {
                self.push_output(
                    vec![0x14, 0x08],
                    presentation_time_us,
                    BufferFlags::END_OF_STREAM | BufferFlags::CODEC_CONFIG,
                );
            } else {
                self.push_output(Vec::new(), presentation_time_us, BufferFlags::END_OF_STREAM);
            }
        } else {
            {
                let mut state = self.probe.0.lock();
                state.queued_chunks.push(data.len());
                state.queued_timestamps.push(presentation_time_us);
            }
            self.push_output(data.to_vec(), presentation_time_us, BufferFlags::NONE);
        }
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> OutputStatus {
        if let Some(status) = self.injected.pop_front() {
            return match status {
                ScriptedStatus::BuffersChanged => OutputStatus::BuffersChanged,
                ScriptedStatus::TryAgainLater => OutputStatus::TryAgainLater,
                ScriptedStatus::Unknown(code) => OutputStatus::Unknown(code),
                ScriptedStatus::StrayBuffer(size) => {
                    let index = self.slots.len();
                    self.slots.push(vec![0xEE; size]);
                    OutputStatus::Buffer {
                        index,
                        info: BufferInfo {
                            offset: 0,
                            size,
                            presentation_time_us: 0,
                            flags: BufferFlags::NONE,
                        },
                    }
                }
            };
        }
        match self.pending.pop_front() {
            Some(status) => {
                if let OutputStatus::Buffer { info, .. } = &status {
                    if !info.is_codec_config() {
                        self.in_flight -= 1;
                    }
                    if info.is_end_of_stream() {
                        self.probe.0.lock().eos_outputs += 1;
                    }
                }
                status
            }
            None => OutputStatus::TryAgainLater,
        }
    }

    fn output_buffer(&self, index: usize, info: &BufferInfo) -> &[u8] {
        &self.slots[index][info.offset..info.offset + info.size]
    }

    fn release_output_buffer(&mut self, index: usize) {
        self.slots[index].clear();
    }

    fn stop(&mut self) {}
}

/// Muxer that appends raw sample bytes to the output file.
struct FakeMuxer {
    probe: TranscodeProbe,
    file: File,
}

impl MediaMuxer for FakeMuxer {
    fn add_track(&mut self, _format: &TrackFormat) -> Result<usize, RecorderError> {
        self.probe.0.lock().add_track_calls += 1;
        Ok(0)
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        self.probe.0.lock().muxer_started = true;
        Ok(())
    }

    fn write_sample_data(&mut self, _track: usize, data: &[u8], info: &BufferInfo) -> Result<(), RecorderError> {
        {
            let mut state = self.probe.0.lock();
            if !state.muxer_started {
                state.wrote_before_start = true;
            }
            if info.is_codec_config() {
                state.config_buffers_written += 1;
            }
        }
        self.file
            .write_all(data)
            .map_err(|e| RecorderError::Muxing(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.probe.0.lock().muxer_started {
            return Err(RecorderError::Muxing("muxer was never started".into()));
        }
        self.file.flush().map_err(|e| RecorderError::Muxing(e.to_string()))
    }

    fn release(&mut self) {
        self.probe.0.lock().muxer_released = true;
    }
}

pub struct FakeTranscoder {
    probe: TranscodeProbe,
    injected: Vec<ScriptedStatus>,
    delay: Duration,
    config_on_eos: bool,
    fail_start: bool,
    pub encoders_created: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self {
            probe: TranscodeProbe::default(),
            injected: Vec::new(),
            delay: Duration::ZERO,
            config_on_eos: false,
            fail_start: false,
            encoders_created: AtomicUsize::new(0),
        }
    }

    pub fn with_injected_statuses(mut self, statuses: Vec<ScriptedStatus>) -> Self {
        self.injected = statuses;
        self
    }

    /// Slow every input submission down, to keep a transcode in flight.
    pub fn with_input_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Carry codec config bytes on the end-of-stream output buffer.
    pub fn with_config_on_eos(mut self) -> Self {
        self.config_on_eos = true;
        self
    }

    /// Make the encoder fail to start.
    pub fn with_failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn probe(&self) -> TranscodeProbe {
        self.probe.clone()
    }
}

impl TranscoderBackend for FakeTranscoder {
    fn create_encoder(&self, _config: &EncoderConfig) -> Result<Box<dyn AudioEncoder>, RecorderError> {
        self.encoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEncoder {
            probe: self.probe.clone(),
            injected: self.injected.iter().copied().collect(),
            pending: VecDeque::new(),
            slots: Vec::new(),
            format_sent: false,
            in_flight: 0,
            delay: self.delay,
            config_on_eos: self.config_on_eos,
            fail_start: self.fail_start,
        }))
    }

    fn create_muxer(&self, output_path: &Path) -> Result<Box<dyn MediaMuxer>, RecorderError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(output_path)
            .map_err(|e| RecorderError::Muxing(e.to_string()))?;
        Ok(Box::new(FakeMuxer {
            probe: self.probe.clone(),
            file,
        }))
    }
}
