//! # speech-capture-core
//!
//! Speech recording session core.
//!
//! Drives a mono 16 kHz capture device through a strict session state
//! machine, streams PCM into a WAV container whose size fields are patched on
//! close, optionally ends the recording on its own (duration cap, speech end,
//! clipping) and transcodes the result to AAC in an MP4 container in the
//! background. Capture devices, permission checks, headset monitoring and the
//! AAC encoder/muxer are platform services behind traits.
//!
//! ## Architecture
//!
//! ```text
//! speech-capture-core (this crate)
//! ├── traits/       ← CaptureBackend, PermissionSource, HeadsetMonitor, SignalAnalyzer,
//! │                   RecordingListener, AudioEncoder, MediaMuxer, TranscoderBackend
//! ├── models/       ← RecorderError, SessionState, RecordingEvent, RecorderConfiguration, etc.
//! ├── processing/   ← WAV header layout, EnergyAnalyzer
//! ├── storage/      ← RawAudioWriter, SHA-256 checksum
//! ├── transcode/    ← TranscodePipeline (encoder/muxer pump)
//! └── session/      ← RecordingController (state machine, capture loop, ticker)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transcode;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{RecorderConfiguration, StopModeParams};
pub use models::error::RecorderError;
pub use models::event::{EventKind, RecordingEvent};
pub use models::state::{SessionState, StopReason};
pub use models::transcode_report::TranscodeReport;
pub use processing::energy_analyzer::EnergyAnalyzer;
pub use session::controller::RecordingController;
pub use storage::raw_writer::{RawAudioSummary, RawAudioWriter};
pub use traits::capture_device::{CaptureBackend, CaptureDevice};
pub use traits::encoder::{AudioEncoder, MediaMuxer, TranscoderBackend};
pub use traits::headset::{HeadsetMonitor, HeadsetPlug};
pub use traits::listener::RecordingListener;
pub use traits::permission::PermissionSource;
pub use traits::signal_analyzer::SignalAnalyzer;
pub use transcode::pipeline::TranscodePipeline;
