use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::event::RecordingEvent;
use crate::models::state::StopReason;
use crate::storage::raw_writer::RawAudioWriter;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::signal_analyzer::SignalAnalyzer;

use super::controller::ControllerInner;
use super::tasks::CancelToken;

/// Initial capacity of the representative-value history.
const HISTORY_CAPACITY: usize = 15_000;

/// Everything the capture thread owns for one recording.
pub(crate) struct CaptureLoop {
    pub inner: Arc<ControllerInner>,
    pub token: CancelToken,
    pub device: Arc<dyn CaptureDevice>,
    pub writer: Arc<Mutex<Option<RawAudioWriter>>>,
    pub analyzer: Arc<Mutex<Box<dyn SignalAnalyzer>>>,
    pub frame_size: usize,
    pub auto_stop: bool,
    pub clipping_threshold: i16,
}

enum Verdict {
    Continue,
    Stop(StopReason),
}

impl CaptureLoop {
    /// Read, analyse and persist frames until cancelled.
    pub fn run(self) {
        let mut frame = vec![0i16; self.frame_size];
        let mut history: Vec<i16> = Vec::with_capacity(HISTORY_CAPACITY);
        let mut speech_started = false;

        while !self.token.is_cancelled() {
            let samples_read = match self.device.read(&mut frame) {
                Ok(n) => n,
                Err(e) => {
                    if !self.token.is_cancelled() {
                        log::error!("capture device read failed: {}", e);
                    }
                    break;
                }
            };
            // A read that completes after cancellation is abandoned.
            if self.token.is_cancelled() {
                break;
            }
            if samples_read == 0 {
                continue;
            }
            let samples = &frame[..samples_read.min(frame.len())];

            let representative = self.analyzer.lock().representative_sample(samples);
            history.push(representative);

            {
                let mut guard = self.writer.lock();
                let Some(writer) = guard.as_mut() else {
                    // Closed by stop_recording; ownership has moved on.
                    break;
                };
                writer.set_amplitude(representative.unsigned_abs());
                if let Err(e) = writer.write_samples(samples, samples.len()) {
                    log::error!("failed to append captured samples: {}", e);
                    drop(guard);
                    self.inner.stop_from_task(&self.token, StopReason::WriteFailed);
                    break;
                }
            }

            if !self.auto_stop {
                continue;
            }

            match self.auto_stop_verdict(representative, &history, &mut speech_started) {
                Verdict::Continue => {}
                Verdict::Stop(reason) => {
                    self.inner.stop_from_task(&self.token, reason);
                    break;
                }
            }
        }
        log::debug!("capture loop exited after {} frames", history.len());
    }

    fn auto_stop_verdict(&self, representative: i16, history: &[i16], speech_started: &mut bool) -> Verdict {
        if representative > self.clipping_threshold {
            log::info!("representative sample {} exceeds clipping threshold", representative);
            return Verdict::Stop(StopReason::Clipping);
        }

        let mut analyzer = self.analyzer.lock();
        if !*speech_started {
            if analyzer.speech_started(history) {
                log::info!("speech start detected at frame {}", history.len());
                *speech_started = true;
            }
            Verdict::Continue
        } else if analyzer.speech_stopped(history) {
            log::info!("speech end detected at frame {}", history.len());
            Verdict::Stop(StopReason::SpeechEnded)
        } else {
            Verdict::Continue
        }
    }
}

/// Emits one `Duration` event per tick and enforces the duration cap.
pub(crate) struct DurationTicker {
    pub inner: Arc<ControllerInner>,
    pub token: CancelToken,
    pub interval: Duration,
    pub cap_secs: Option<u32>,
}

impl DurationTicker {
    pub fn run(self) {
        let mut elapsed_secs: u32 = 0;
        while !self.token.wait_cancelled(self.interval) {
            elapsed_secs += 1;
            self.inner.post_event(&RecordingEvent::duration(elapsed_secs));
            if self.cap_secs == Some(elapsed_secs) {
                log::info!("duration cap of {}s reached", elapsed_secs);
                self.inner.stop_from_task(&self.token, StopReason::DurationElapsed);
                break;
            }
        }
    }
}
