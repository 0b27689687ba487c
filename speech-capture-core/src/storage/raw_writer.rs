use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::config::SAMPLE_RATE;
use crate::models::error::RecorderError;
use crate::processing::wav_format;

/// Size of the in-memory staging buffer.
pub const STAGING_BUFFER_SIZE: usize = 0x4000;

/// Largest PCM payload whose RIFF size (`36 + payload`) still fits the 32-bit field.
pub const MAX_PAYLOAD_BYTES: u32 = (u32::MAX - 36) & !1;

/// What the writer knew about the artifact when it was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAudioSummary {
    pub file_path: PathBuf,
    pub payload_bytes: u32,
    pub peak_amplitude: u16,
}

/// Streaming WAV writer for the raw recording.
///
/// ## File Format
/// ```text
/// [44-byte WAV header, sizes zeroed until close]
/// [16-bit little-endian mono PCM...]
/// ```
///
/// Samples are staged in a 16 KiB buffer and flushed whenever it fills. The
/// writer is not internally synchronized; exactly one thread appends.
pub struct RawAudioWriter {
    file_path: PathBuf,
    file: File,
    staging: Vec<u8>,
    payload_bytes: u32,
    peak_amplitude: u16,
}

impl RawAudioWriter {
    /// Create (or truncate) `file_path` and write the placeholder header.
    pub fn create(file_path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let file_path = file_path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .map_err(|e| RecorderError::Storage(format!("failed to create {}: {}", file_path.display(), e)))?;

        file.write_all(&wav_format::placeholder_header(SAMPLE_RATE))
            .map_err(|e| RecorderError::Storage(format!("failed to write header: {}", e)))?;

        Ok(Self {
            file_path,
            file,
            staging: Vec::with_capacity(STAGING_BUFFER_SIZE),
            payload_bytes: 0,
            peak_amplitude: 0,
        })
    }

    /// Append the first `count` samples of `samples`, in order.
    ///
    /// Fails without writing anything once the container would outgrow the
    /// WAV size fields.
    pub fn write_samples(&mut self, samples: &[i16], count: usize) -> Result<(), RecorderError> {
        let mut remaining = &samples[..count.min(samples.len())];
        let fits = u32::try_from(remaining.len() * 2)
            .ok()
            .and_then(|bytes| self.payload_bytes.checked_add(bytes))
            .is_some_and(|total| total <= MAX_PAYLOAD_BYTES);
        if !fits {
            return Err(RecorderError::Storage(format!(
                "{} reached the WAV size limit at {} payload bytes",
                self.file_path.display(),
                self.payload_bytes
            )));
        }
        while !remaining.is_empty() {
            if self.staging.len() == STAGING_BUFFER_SIZE {
                self.flush_staging()?;
            }
            let room = (STAGING_BUFFER_SIZE - self.staging.len()) / 2;
            let take = room.min(remaining.len());
            let (head, tail) = remaining.split_at(take);
            wav_format::extend_le_samples(&mut self.staging, head);
            self.payload_bytes += (take * 2) as u32;
            remaining = tail;
        }
        Ok(())
    }

    /// Merge `value` into the session peak.
    pub fn set_amplitude(&mut self, value: u16) {
        self.peak_amplitude = self.peak_amplitude.max(value);
    }

    pub fn peak_amplitude(&self) -> u16 {
        self.peak_amplitude
    }

    /// PCM bytes accepted so far, staged or on disk.
    pub fn payload_bytes(&self) -> u32 {
        self.payload_bytes
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Flush staged samples, patch both size fields and close the file.
    pub fn close(mut self) -> Result<RawAudioSummary, RecorderError> {
        self.flush_staging()?;

        self.file
            .seek(SeekFrom::Start(wav_format::RIFF_SIZE_OFFSET))
            .map_err(|e| RecorderError::Storage(e.to_string()))?;
        self.file
            .write_all(&wav_format::riff_size_bytes(self.payload_bytes))
            .map_err(|e| RecorderError::Storage(e.to_string()))?;

        self.file
            .seek(SeekFrom::Start(wav_format::DATA_SIZE_OFFSET))
            .map_err(|e| RecorderError::Storage(e.to_string()))?;
        self.file
            .write_all(&wav_format::data_size_bytes(self.payload_bytes))
            .map_err(|e| RecorderError::Storage(e.to_string()))?;

        self.file.sync_all().map_err(|e| RecorderError::Storage(e.to_string()))?;
        log::debug!(
            "closed {} with {} payload bytes",
            self.file_path.display(),
            self.payload_bytes
        );

        Ok(RawAudioSummary {
            file_path: self.file_path,
            payload_bytes: self.payload_bytes,
            peak_amplitude: self.peak_amplitude,
        })
    }

    fn flush_staging(&mut self) -> Result<(), RecorderError> {
        if self.staging.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.staging)
            .map_err(|e| RecorderError::Storage(format!("write failed: {}", e)))?;
        self.staging.clear();
        Ok(())
    }
}
