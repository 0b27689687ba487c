use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Capture sample rate in Hz. The raw and compressed artifacts share it.
pub const SAMPLE_RATE: u32 = 16_000;

/// Channel count of every artifact (mono).
pub const CHANNELS: u16 = 1;

/// Bits per PCM sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// How a recording session ends on its own.
///
/// `duration_in_seconds` is the hard cap honored by the duration ticker in
/// both modes; `None` disables the cap. `auto_stop_mode` enables the
/// speech-boundary and clipping checks in the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopModeParams {
    #[serde(default)]
    pub duration_in_seconds: Option<u32>,
    #[serde(default)]
    pub auto_stop_mode: bool,
}

impl StopModeParams {
    pub fn new(duration_in_seconds: u32, auto_stop_mode: bool) -> Self {
        Self {
            duration_in_seconds: Some(duration_in_seconds),
            auto_stop_mode,
        }
    }

    /// Speech-driven stop with no duration cap.
    pub fn uncapped_auto() -> Self {
        Self {
            duration_in_seconds: None,
            auto_stop_mode: true,
        }
    }
}

impl Default for StopModeParams {
    fn default() -> Self {
        Self::new(60, false)
    }
}

/// Configuration supplied when the controller is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfiguration {
    pub stop_mode: StopModeParams,

    /// Samples read from the device per capture iteration (default: 512).
    pub frame_size: usize,

    /// Representative value above which auto-stop treats the input as clipped.
    pub clipping_threshold: i16,

    /// Delay between duration ticks in milliseconds (default: 1000).
    pub tick_interval_ms: u64,

    /// Bounded wait for encoder buffer availability in milliseconds.
    pub encoder_timeout_ms: u64,
}

impl RecorderConfiguration {
    pub fn with_stop_mode(stop_mode: StopModeParams) -> Self {
        Self {
            stop_mode,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.stop_mode.duration_in_seconds == Some(0) {
            return Err(RecorderError::InvalidConfiguration(
                "duration cap must be at least one second".into(),
            ));
        }
        if self.frame_size == 0 {
            return Err(RecorderError::InvalidConfiguration("frame size must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(RecorderError::InvalidConfiguration("tick interval must be positive".into()));
        }
        if self.clipping_threshold <= 0 {
            return Err(RecorderError::InvalidConfiguration(format!(
                "clipping threshold must be positive, got {}",
                self.clipping_threshold
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::InvalidConfiguration(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_millis(self.encoder_timeout_ms)
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            stop_mode: StopModeParams::default(),
            frame_size: 512,
            clipping_threshold: 20_000,
            tick_interval_ms: 1000,
            encoder_timeout_ms: 5000,
        }
    }
}
