use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::SAMPLE_RATE;
use crate::models::error::RecorderError;
use crate::models::transcode_report::TranscodeReport;
use crate::processing::wav_format::WAV_HEADER_SIZE;
use crate::storage::checksum::sha256_file;
use crate::traits::encoder::{
    AudioEncoder, BufferFlags, EncoderConfig, MediaMuxer, OutputStatus, TranscoderBackend,
};

/// Bytes of raw PCM read per encoder input slot (upper bound).
pub const TRANSCODE_CHUNK_SIZE: usize = 48_000;

/// Extension of the compressed artifact.
pub const COMPRESSED_EXTENSION: &str = "m4a";

/// Default bounded wait for encoder buffers.
pub const DEFAULT_ENCODER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Receives the completion percentage whenever it changes.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync + 'static>;

/// Path of the compressed artifact for a raw recording.
pub fn compressed_path_for(raw_path: &Path) -> PathBuf {
    raw_path.with_extension(COMPRESSED_EXTENSION)
}

/// Presentation time in microseconds after `total_bytes` of 16-bit mono PCM.
pub fn presentation_time_us(total_bytes: u64) -> i64 {
    (1_000_000 * (total_bytes / 2) / SAMPLE_RATE as u64) as i64
}

/// Converts a finished raw WAV into an AAC track inside an MPEG-4 container.
///
/// Data flow:
/// ```text
/// [raw file] → 48 KB chunks → [encoder input slots]
///                                   ↓
///             [muxer] ← non-config output buffers ← [encoder output slots]
/// ```
/// The muxer track is added and started the first time the encoder reports
/// its output format; no sample is written before that. The pump ends when a
/// drained output buffer carries the end-of-stream flag.
pub struct TranscodePipeline {
    session_id: String,
    input_path: PathBuf,
    output_path: PathBuf,
    encoder: Box<dyn AudioEncoder>,
    muxer: Box<dyn MediaMuxer>,
    timeout: Duration,
    cancelled: Arc<AtomicBool>,
    progress: Arc<AtomicU8>,
    on_progress: Option<ProgressCallback>,
}

#[derive(Debug, Default)]
struct PumpStats {
    payload_bytes: u64,
    samples_written: u64,
    encoded_bytes: u64,
    duration_us: i64,
}

impl TranscodePipeline {
    /// Prepare a transcode of `input_path`, replacing any previous output.
    pub fn new(input_path: impl Into<PathBuf>, backend: &dyn TranscoderBackend) -> Result<Self, RecorderError> {
        let input_path = input_path.into();
        let output_path = compressed_path_for(&input_path);
        log::debug!("transcode output file {}", output_path.display());

        match fs::remove_file(&output_path) {
            Ok(()) => log::debug!("replaced previous {}", output_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RecorderError::Storage(format!(
                    "failed to remove previous output {}: {}",
                    output_path.display(),
                    e
                )))
            }
        }

        let encoder = backend.create_encoder(&EncoderConfig::default())?;
        let muxer = backend.create_muxer(&output_path)?;

        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            input_path,
            output_path,
            encoder,
            muxer,
            timeout: DEFAULT_ENCODER_TIMEOUT,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicU8::new(0)),
            on_progress: None,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a cancellation flag, checked once per pump iteration.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Share the percentage cell so other threads can poll progress.
    pub fn with_progress_cell(mut self, progress: Arc<AtomicU8>) -> Self {
        self.progress = progress;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Run the pump to completion and finalize the container.
    pub fn run(mut self) -> Result<TranscodeReport, RecorderError> {
        let pumped = self.encode();

        if let Err(e) = self.muxer.stop() {
            log::warn!("muxer stop failed: {}", e);
        }
        self.muxer.release();

        let stats = pumped?;
        let checksum = sha256_file(&self.output_path)?;
        log::info!(
            "transcoded {} -> {} ({} samples, {} bytes)",
            self.input_path.display(),
            self.output_path.display(),
            stats.samples_written,
            stats.encoded_bytes
        );

        Ok(TranscodeReport {
            session_id: self.session_id,
            input_path: self.input_path,
            output_path: self.output_path,
            payload_bytes: stats.payload_bytes,
            samples_written: stats.samples_written,
            encoded_bytes: stats.encoded_bytes,
            duration_us: stats.duration_us,
            checksum,
            finished_at: chrono::Utc::now(),
        })
    }

    /// Open the raw input and drive the encoder. The muxer is left to the caller.
    fn encode(&mut self) -> Result<PumpStats, RecorderError> {
        let mut input = File::open(&self.input_path).map_err(|e| {
            RecorderError::Storage(format!("failed to open {}: {}", self.input_path.display(), e))
        })?;
        let file_len = input
            .metadata()
            .map_err(|e| RecorderError::Storage(e.to_string()))?
            .len();
        let payload_total = file_len.saturating_sub(WAV_HEADER_SIZE as u64);
        input
            .seek(SeekFrom::Start(WAV_HEADER_SIZE as u64))
            .map_err(|e| RecorderError::Storage(e.to_string()))?;

        self.progress.store(0, Ordering::SeqCst);
        self.encoder.start()?;
        let pumped = self.pump(&mut input, payload_total);
        self.encoder.stop();
        pumped
    }

    fn pump(&mut self, input: &mut File, payload_total: u64) -> Result<PumpStats, RecorderError> {
        let mut chunk = vec![0u8; TRANSCODE_CHUNK_SIZE];
        let mut stats = PumpStats::default();
        let mut presentation_us: i64 = 0;
        let mut has_more_data = true;
        let mut track: Option<usize> = None;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                log::info!("transcode of {} cancelled", self.input_path.display());
                return Err(RecorderError::Cancelled);
            }

            // Feed every free input slot.
            while has_more_data {
                let Some(index) = self.encoder.dequeue_input_buffer(self.timeout) else {
                    break;
                };
                let capacity = match self.encoder.input_capacity(index) {
                    0 => TRANSCODE_CHUNK_SIZE,
                    c => c.min(TRANSCODE_CHUNK_SIZE),
                };
                let bytes_read = read_chunk(input, &mut chunk[..capacity])?;
                if bytes_read == 0 {
                    has_more_data = false;
                    log::debug!("input exhausted, queueing end of stream in slot {}", index);
                    self.encoder
                        .queue_input_buffer(index, &[], presentation_us, BufferFlags::END_OF_STREAM)?;
                } else {
                    stats.payload_bytes += bytes_read as u64;
                    self.encoder.queue_input_buffer(
                        index,
                        &chunk[..bytes_read],
                        presentation_us,
                        BufferFlags::NONE,
                    )?;
                    presentation_us = presentation_time_us(stats.payload_bytes);
                }
            }

            // Drain everything the encoder has ready.
            let mut end_of_stream = false;
            loop {
                match self.encoder.dequeue_output_buffer(self.timeout) {
                    OutputStatus::Buffer { index, info } => {
                        if info.is_codec_config() && info.size != 0 {
                            log::debug!("skipping {} bytes of codec config", info.size);
                        } else if info.size > 0 {
                            match track {
                                Some(track) => {
                                    let data = self.encoder.output_buffer(index, &info);
                                    self.muxer.write_sample_data(track, data, &info)?;
                                    stats.samples_written += 1;
                                    stats.encoded_bytes += info.size as u64;
                                }
                                None => log::warn!(
                                    "dropping {} encoded bytes received before the output format",
                                    info.size
                                ),
                            }
                        }
                        self.encoder.release_output_buffer(index);
                        if info.is_end_of_stream() {
                            stats.duration_us = info.presentation_time_us;
                            end_of_stream = true;
                            break;
                        }
                    }
                    OutputStatus::FormatChanged(format) => {
                        if track.is_some() {
                            log::warn!("ignoring renegotiated output format {:?}", format);
                            continue;
                        }
                        log::debug!("output format negotiated: {:?}", format);
                        let index = self.muxer.add_track(&format)?;
                        self.muxer.start()?;
                        track = Some(index);
                    }
                    OutputStatus::BuffersChanged => {
                        log::warn!("output buffers changed during encode");
                    }
                    OutputStatus::TryAgainLater => break,
                    OutputStatus::Unknown(code) => {
                        log::warn!("unknown status from encoder output queue: {}", code);
                    }
                }
            }

            self.report_progress(completion_percent(stats.payload_bytes, payload_total, has_more_data));

            if end_of_stream {
                return Ok(stats);
            }
        }
    }

    fn report_progress(&self, percent: u8) {
        let previous = self.progress.swap(percent, Ordering::SeqCst);
        if previous != percent {
            log::trace!("conversion {}%", percent);
            if let Some(ref callback) = self.on_progress {
                callback(percent);
            }
        }
    }
}

fn completion_percent(processed: u64, total: u64, has_more_data: bool) -> u8 {
    if total == 0 {
        return if has_more_data { 0 } else { 100 };
    }
    ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Fill `buf` from `input`, stopping early only at end of file.
fn read_chunk(input: &mut File, buf: &mut [u8]) -> Result<usize, RecorderError> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(RecorderError::Storage(format!("failed to read raw audio: {}", e))),
        }
    }
    Ok(filled)
}
