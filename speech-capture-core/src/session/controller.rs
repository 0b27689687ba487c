use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::models::config::{RecorderConfiguration, SAMPLE_RATE};
use crate::models::error::RecorderError;
use crate::models::event::RecordingEvent;
use crate::models::state::{SessionState, StopReason};
use crate::models::transcode_report::TranscodeReport;
use crate::storage::raw_writer::RawAudioWriter;
use crate::traits::capture_device::{CaptureBackend, CaptureDevice};
use crate::traits::encoder::TranscoderBackend;
use crate::traits::headset::{HeadsetMonitor, HeadsetPlug};
use crate::traits::listener::RecordingListener;
use crate::traits::permission::PermissionSource;
use crate::traits::signal_analyzer::SignalAnalyzer;
use crate::transcode::pipeline::{compressed_path_for, TranscodePipeline};

use super::capture::{CaptureLoop, DurationTicker};
use super::tasks::{join_all, CancelToken, TaskGroup};

/// Resources of the current recording session, guarded by the control lock.
struct Session {
    id: String,
    device: Option<Arc<dyn CaptureDevice>>,
    raw_path: Option<PathBuf>,
    tasks: Option<TaskGroup>,
    transcode_cancel: Option<Arc<AtomicBool>>,
    last_report: Option<TranscodeReport>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device: None,
            raw_path: None,
            tasks: None,
            transcode_cancel: None,
            last_report: None,
        }
    }
}

pub(crate) struct ControllerInner {
    config: RecorderConfiguration,
    capture_backend: Arc<dyn CaptureBackend>,
    permission: Arc<dyn PermissionSource>,
    transcoder: Arc<dyn TranscoderBackend>,
    headset: RwLock<Option<Arc<dyn HeadsetMonitor>>>,
    headset_registered: AtomicBool,
    analyzer: Arc<Mutex<Box<dyn SignalAnalyzer>>>,
    listener: RwLock<Option<Arc<dyn RecordingListener>>>,
    state: RwLock<SessionState>,
    /// Serialises control operations and owns the session resources.
    control: Mutex<Session>,
    /// Sole writer during Recording; taken out and closed on stop.
    writer: Arc<Mutex<Option<RawAudioWriter>>>,
    /// Cancelled task threads waiting to be joined outside the control lock.
    retired: Mutex<Vec<JoinHandle<()>>>,
    last_stop_reason: Mutex<Option<StopReason>>,
    transcode_progress: Arc<AtomicU8>,
}

/// Recording session state machine.
///
/// Drives one session at a time through
/// `initialize → set_output_path → prepare → start_recording → stop_recording`,
/// after which the raw WAV is transcoded to AAC in the background and the
/// session ends in `Done`. An operation issued from the wrong state forces the
/// session to `Invalid` (stopping an active recording first) and reports
/// failure; `initialize` recovers from there.
///
/// Listeners are invoked while the control lock is held and must not call
/// back into the controller synchronously.
pub struct RecordingController {
    inner: Arc<ControllerInner>,
}

impl RecordingController {
    pub fn new(
        config: RecorderConfiguration,
        capture_backend: Arc<dyn CaptureBackend>,
        permission: Arc<dyn PermissionSource>,
        transcoder: Arc<dyn TranscoderBackend>,
        analyzer: Box<dyn SignalAnalyzer>,
    ) -> Result<Self, RecorderError> {
        config.validate()?;
        let inner = Arc::new(ControllerInner {
            config,
            capture_backend,
            permission,
            transcoder,
            headset: RwLock::new(None),
            headset_registered: AtomicBool::new(false),
            analyzer: Arc::new(Mutex::new(analyzer)),
            listener: RwLock::new(None),
            state: RwLock::new(SessionState::Uninitialized),
            control: Mutex::new(Session::new()),
            writer: Arc::new(Mutex::new(None)),
            retired: Mutex::new(Vec::new()),
            last_stop_reason: Mutex::new(None),
            transcode_progress: Arc::new(AtomicU8::new(0)),
        });
        inner.set_state(SessionState::Invalid);
        Ok(Self { inner })
    }

    /// Attach a headset monitor and register for plug events right away.
    pub fn with_headset_monitor(self, monitor: Arc<dyn HeadsetMonitor>) -> Self {
        *self.inner.headset.write() = Some(monitor);
        self.inner.ensure_headset_registered();
        self
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.inner.config
    }

    /// Register the host listener and immediately post the current state.
    pub fn set_listener(&self, listener: Arc<dyn RecordingListener>) {
        *self.inner.listener.write() = Some(listener);
        self.inner.post_event(&RecordingEvent::state_change(self.state()));
    }

    pub fn remove_listener(&self) {
        *self.inner.listener.write() = None;
    }

    /// Start a new session. Accepted from `Invalid` or `Done`.
    ///
    /// Returns `Ok(false)` when called from any other state (the session is
    /// forced to `Invalid`). Permission and device failures are raised.
    pub fn initialize(&self) -> Result<bool, RecorderError> {
        let result = {
            let mut session = self.inner.control.lock();
            self.inner.initialize_locked(&mut session)
        };
        self.inner.join_retired();
        result
    }

    /// Set the raw WAV path. Parent directories are created as needed.
    pub fn set_output_path(&self, path: impl AsRef<Path>) -> bool {
        let accepted = {
            let mut session = self.inner.control.lock();
            self.inner.set_output_path_locked(&mut session, path.as_ref())
        };
        self.inner.join_retired();
        accepted
    }

    pub fn prepare(&self) -> Result<bool, RecorderError> {
        let result = {
            let mut session = self.inner.control.lock();
            self.inner.prepare_locked(&mut session)
        };
        self.inner.join_retired();
        result
    }

    /// Start capture, the capture loop and the duration ticker.
    pub fn start_recording(&self) -> bool {
        let started = {
            let mut session = self.inner.control.lock();
            self.inner.start_recording_locked(&mut session)
        };
        self.inner.join_retired();
        started
    }

    /// Stop capture, finalize the raw file and start the transcode.
    pub fn stop_recording(&self) -> bool {
        let stopped = {
            let mut session = self.inner.control.lock();
            let recording = self.inner.require_state(&mut session, SessionState::Recording, "stop_recording");
            if recording {
                self.inner.stop_locked(&mut session, StopReason::Host, false);
            }
            recording
        };
        self.inner.join_retired();
        stopped
    }

    /// Release device, file, headset and listener resources. An open raw file
    /// is finalized. The session state is left as is; `initialize` starts over.
    pub fn deinitialize(&self) {
        {
            let mut session = self.inner.control.lock();
            if let Some(tasks) = session.tasks.take() {
                self.inner.retired.lock().extend(tasks.cancel());
            }
            if let Some(writer) = self.inner.writer.lock().take() {
                match writer.close() {
                    Ok(summary) => log::info!(
                        "raw recording {} finalized on release ({} payload bytes)",
                        summary.file_path.display(),
                        summary.payload_bytes
                    ),
                    Err(e) => log::warn!("failed to finalize raw recording on release: {}", e),
                }
            }
            if let Some(cancel) = session.transcode_cancel.take() {
                cancel.store(true, Ordering::SeqCst);
            }
            if let Some(device) = session.device.take() {
                device.stop();
            }
            let headset = self.inner.headset.read().clone();
            if let Some(headset) = headset {
                if self.inner.headset_registered.swap(false, Ordering::SeqCst) {
                    headset.unregister();
                }
            }
        }
        self.remove_listener();
        self.inner.join_retired();
        log::debug!("deinitialized in state {}", self.state());
    }

    /// Peak amplitude of the current recording, or 0 when not recording.
    pub fn max_amplitude(&self) -> u16 {
        if !self.state().is_recording() {
            return 0;
        }
        self.inner
            .writer
            .lock()
            .as_ref()
            .map(|w| w.peak_amplitude())
            .unwrap_or(0)
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        *self.inner.last_stop_reason.lock()
    }

    /// Completion percentage of the current (or last) transcode.
    pub fn transcode_progress(&self) -> u8 {
        self.inner.transcode_progress.load(Ordering::SeqCst)
    }

    pub fn last_transcode_report(&self) -> Option<TranscodeReport> {
        self.inner.control.lock().last_report.clone()
    }

    pub fn raw_output_path(&self) -> Option<PathBuf> {
        self.inner.control.lock().raw_path.clone()
    }

    pub fn compressed_output_path(&self) -> Option<PathBuf> {
        self.raw_output_path().map(|p| compressed_path_for(&p))
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.deinitialize();
    }
}

impl ControllerInner {
    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        log::debug!("state -> {}", state);
        self.post_event(&RecordingEvent::state_change(state));
    }

    pub(crate) fn post_event(&self, event: &RecordingEvent) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_recording_event(event);
        }
    }

    fn ensure_headset_registered(self: &Arc<Self>) {
        let Some(headset) = self.headset.read().clone() else {
            return;
        };
        if self.headset_registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        headset.register(Arc::new(move |plug: HeadsetPlug| {
            if let Some(inner) = weak.upgrade() {
                log::debug!("headset event {:?}", plug);
                inner.post_event(&RecordingEvent::headset_plug(plug.is_connected()));
            }
        }));
    }

    /// Check the precondition of a control operation. On mismatch, force
    /// `Invalid` (unless already there) and report false.
    fn require_state(self: &Arc<Self>, session: &mut Session, required: SessionState, operation: &str) -> bool {
        let current = self.state();
        if current == required {
            return true;
        }
        if current == SessionState::Invalid {
            log::debug!("{}() ignored in Invalid state; initialize first", operation);
            return false;
        }
        log::debug!("{}() requires {} but state is {}", operation, required, current);
        self.invalidate(session);
        false
    }

    /// Force `Invalid`, stopping any recording first and releasing every
    /// file and device resource of the session.
    fn invalidate(self: &Arc<Self>, session: &mut Session) {
        if self.state().is_recording() {
            self.stop_locked(session, StopReason::Invalidated, true);
        }
        if let Some(cancel) = session.transcode_cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        if let Some(writer) = self.writer.lock().take() {
            if let Err(e) = writer.close() {
                log::warn!("failed to close abandoned raw file: {}", e);
            }
        }
        if let Some(device) = session.device.take() {
            device.stop();
        }
        if self.state() != SessionState::Invalid {
            self.set_state(SessionState::Invalid);
        }
    }

    fn initialize_locked(self: &Arc<Self>, session: &mut Session) -> Result<bool, RecorderError> {
        self.ensure_headset_registered();

        let current = self.state();
        if !current.can_initialize() {
            log::debug!("initialize() requires Invalid or Done but state is {}", current);
            self.invalidate(session);
            return Ok(false);
        }

        if !self.permission.has_record_permission() {
            log::debug!("initialize() failed: record permission not granted");
            self.set_state(SessionState::Invalid);
            return Err(RecorderError::permission_denied());
        }

        self.post_event(&RecordingEvent::duration(0));

        if let Some(stale) = session.device.take() {
            stale.stop();
        }
        let device = match self.capture_backend.open_device(SAMPLE_RATE) {
            Ok(device) => device,
            Err(e) => {
                log::error!("failed to open capture device: {}", e);
                self.set_state(SessionState::Invalid);
                return Err(e);
            }
        };

        *session = Session::new();
        session.device = Some(device);
        *self.last_stop_reason.lock() = None;
        self.transcode_progress.store(0, Ordering::SeqCst);
        log::info!("initialized session {}", session.id);
        self.set_state(SessionState::Initialized);
        Ok(true)
    }

    fn set_output_path_locked(self: &Arc<Self>, session: &mut Session, path: &Path) -> bool {
        if !self.require_state(session, SessionState::Initialized, "set_output_path") {
            return false;
        }

        let raw = path.as_os_str().to_string_lossy();
        if raw.is_empty() || raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) {
            log::warn!("output path {:?} names a directory", path);
            self.invalidate(session);
            return false;
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("failed to create directory {}: {}", parent.display(), e);
                self.invalidate(session);
                return false;
            }
        }

        match RawAudioWriter::create(path) {
            Ok(writer) => {
                *self.writer.lock() = Some(writer);
                session.raw_path = Some(path.to_path_buf());
                self.set_state(SessionState::FilePathSet);
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                self.invalidate(session);
                false
            }
        }
    }

    fn prepare_locked(self: &Arc<Self>, session: &mut Session) -> Result<bool, RecorderError> {
        if !self.require_state(session, SessionState::FilePathSet, "prepare") {
            return Ok(false);
        }
        if !self.permission.has_record_permission() {
            log::debug!("prepare() failed: record permission not granted");
            self.invalidate(session);
            return Err(RecorderError::permission_denied());
        }
        self.set_state(SessionState::Prepared);
        Ok(true)
    }

    fn start_recording_locked(self: &Arc<Self>, session: &mut Session) -> bool {
        if !self.require_state(session, SessionState::Prepared, "start_recording") {
            return false;
        }
        let Some(device) = session.device.clone() else {
            log::error!("no capture device allocated");
            self.invalidate(session);
            return false;
        };
        if self.writer.lock().is_none() {
            log::error!("no raw file open");
            self.invalidate(session);
            return false;
        }

        self.analyzer.lock().reset();
        if let Err(e) = device.start() {
            log::error!("failed to start capture device: {}", e);
            self.invalidate(session);
            return false;
        }

        *self.last_stop_reason.lock() = None;
        let mut tasks = TaskGroup::new();
        let stop_mode = self.config.stop_mode;

        let capture = CaptureLoop {
            inner: Arc::clone(self),
            token: tasks.token(),
            device,
            writer: Arc::clone(&self.writer),
            analyzer: Arc::clone(&self.analyzer),
            frame_size: self.config.frame_size,
            auto_stop: stop_mode.auto_stop_mode,
            clipping_threshold: self.config.clipping_threshold,
        };
        let ticker = DurationTicker {
            inner: Arc::clone(self),
            token: tasks.token(),
            interval: self.config.tick_interval(),
            cap_secs: stop_mode.duration_in_seconds,
        };

        self.set_state(SessionState::Recording);
        log::info!(
            "recording session {} started (auto stop: {}, cap: {:?}s)",
            session.id,
            stop_mode.auto_stop_mode,
            stop_mode.duration_in_seconds
        );

        let spawned = match tasks.spawn("speech-capture", move || capture.run()) {
            Ok(()) => tasks.spawn("duration-ticker", move || ticker.run()),
            Err(e) => Err(e),
        };
        session.tasks = Some(tasks);
        if let Err(e) = spawned {
            log::error!("failed to spawn recording task: {}", e);
            self.invalidate(session);
            return false;
        }
        true
    }

    /// Leave `Recording`: cancel both tasks, close the raw file, release the
    /// device and, unless suppressed, hand the file to the transcoder.
    fn stop_locked(self: &Arc<Self>, session: &mut Session, reason: StopReason, suppress_transcode: bool) {
        log::info!("stopping recording ({:?})", reason);
        if let Some(tasks) = session.tasks.take() {
            self.retired.lock().extend(tasks.cancel());
        }

        let closed = self.writer.lock().take().map(RawAudioWriter::close);

        if let Some(device) = session.device.take() {
            device.stop();
        }
        *self.last_stop_reason.lock() = Some(reason);
        self.set_state(SessionState::Stopped);

        match closed {
            Some(Ok(summary)) => log::info!(
                "raw recording {} finalized ({} payload bytes, peak {})",
                summary.file_path.display(),
                summary.payload_bytes,
                summary.peak_amplitude
            ),
            Some(Err(e)) => {
                log::error!("failed to finalize raw recording: {}", e);
                if !suppress_transcode {
                    self.set_state(SessionState::Invalid);
                }
                return;
            }
            None => log::warn!("no raw file was open when recording stopped"),
        }

        if !suppress_transcode {
            self.start_transcode_locked(session);
        }
    }

    /// Stop requested by a background task. A no-op once the task's token has
    /// been cancelled, so racing stops produce one transition.
    pub(crate) fn stop_from_task(self: &Arc<Self>, token: &CancelToken, reason: StopReason) {
        {
            let mut session = self.control.lock();
            if token.is_cancelled() || !self.state().is_recording() {
                return;
            }
            self.stop_locked(&mut session, reason, false);
        }
        self.join_retired();
    }

    fn start_transcode_locked(self: &Arc<Self>, session: &mut Session) {
        let Some(raw_path) = session.raw_path.clone() else {
            log::error!("no raw recording to transcode");
            self.set_state(SessionState::Invalid);
            return;
        };

        self.set_state(SessionState::ConvertingToCompressed);
        self.transcode_progress.store(0, Ordering::SeqCst);

        let cancel = Arc::new(AtomicBool::new(false));
        session.transcode_cancel = Some(Arc::clone(&cancel));

        let inner = Arc::clone(self);
        let session_id = session.id.clone();
        let spawned = thread::Builder::new()
            .name("speech-transcode".into())
            .spawn(move || {
                let result = TranscodePipeline::new(&raw_path, inner.transcoder.as_ref()).and_then(|pipeline| {
                    pipeline
                        .with_session_id(session_id)
                        .with_timeout(inner.config.encoder_timeout())
                        .with_cancel_flag(Arc::clone(&cancel))
                        .with_progress_cell(Arc::clone(&inner.transcode_progress))
                        .run()
                });
                inner.finish_transcode(&cancel, result);
            });

        if let Err(e) = spawned {
            log::error!("failed to spawn transcode task: {}", e);
            session.transcode_cancel = None;
            self.set_state(SessionState::Invalid);
        }
    }

    fn finish_transcode(&self, cancel: &AtomicBool, result: Result<TranscodeReport, RecorderError>) {
        let mut session = self.control.lock();
        if cancel.load(Ordering::SeqCst) {
            log::debug!("discarding result of cancelled transcode");
            return;
        }
        session.transcode_cancel = None;
        if self.state() != SessionState::ConvertingToCompressed {
            log::warn!("transcode finished in unexpected state {}", self.state());
            return;
        }
        match result {
            Ok(report) => {
                session.last_report = Some(report);
                self.set_state(SessionState::ConvertedToCompressed);
                self.set_state(SessionState::Done);
            }
            Err(e) => {
                log::error!("transcode failed: {}", e);
                self.set_state(SessionState::Invalid);
            }
        }
    }

    fn join_retired(&self) {
        let handles: Vec<_> = self.retired.lock().drain(..).collect();
        join_all(handles);
    }
}
