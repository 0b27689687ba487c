use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Outcome of a completed transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeReport {
    /// Identifies the recording session that produced the raw artifact.
    pub session_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Raw PCM payload bytes fed to the encoder (header excluded).
    pub payload_bytes: u64,
    /// Encoded access units handed to the muxer.
    pub samples_written: u64,
    pub encoded_bytes: u64,
    /// Presentation time of the end-of-stream buffer in microseconds.
    pub duration_us: i64,
    /// SHA-256 of the finished compressed file, lowercase hex.
    pub checksum: String,
    pub finished_at: DateTime<Utc>,
}

impl TranscodeReport {
    pub fn duration_secs(&self) -> f64 {
        self.duration_us as f64 / 1_000_000.0
    }

    pub fn to_json(&self) -> Result<String, RecorderError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RecorderError::Storage(format!("failed to serialize transcode report: {}", e)))
    }
}
