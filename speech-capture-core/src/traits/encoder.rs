use std::path::Path;
use std::time::Duration;

use crate::models::config::{CHANNELS, SAMPLE_RATE};
use crate::models::error::RecorderError;

/// MIME type of the compressed track.
pub const AAC_MIME_TYPE: &str = "audio/mp4a-latm";

/// Flags attached to encoder buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: Self = Self(0);
    /// One-time codec configuration payload (format description).
    pub const CODEC_CONFIG: Self = Self(0x2);
    pub const END_OF_STREAM: Self = Self(0x4);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Metadata for one encoded output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    pub offset: usize,
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }

    pub fn is_codec_config(&self) -> bool {
        self.flags.contains(BufferFlags::CODEC_CONFIG)
    }
}

/// AAC profile requested from the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    LowComplexity,
}

/// Parameters the encoder is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub profile: AacProfile,
    pub bit_rate: u32,
    pub max_input_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            mime_type: AAC_MIME_TYPE.to_string(),
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            profile: AacProfile::LowComplexity,
            bit_rate: 64_000,
            max_input_size: 16_384,
        }
    }
}

/// Track description negotiated by the encoder and handed to the muxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Codec-specific data (e.g. the AudioSpecificConfig).
    pub codec_specific_data: Vec<u8>,
}

/// Result of polling the encoder's output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStatus {
    /// Output slot `index` holds encoded bytes described by `info`.
    Buffer { index: usize, info: BufferInfo },
    /// The encoder negotiated (or renegotiated) its output format.
    FormatChanged(TrackFormat),
    /// Output slot set was reallocated.
    BuffersChanged,
    /// Nothing ready yet; poll again later.
    TryAgainLater,
    /// Device-specific status code the pipeline does not understand.
    Unknown(i32),
}

/// Pull-style hardware encoder with input and output buffer queues.
pub trait AudioEncoder: Send {
    fn start(&mut self) -> Result<(), RecorderError>;

    /// Wait up to `timeout` for a free input slot.
    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Option<usize>;

    /// Capacity in bytes of input slot `index`.
    fn input_capacity(&self, index: usize) -> usize;

    /// Submit `data` in input slot `index`.
    fn queue_input_buffer(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: i64,
        flags: BufferFlags,
    ) -> Result<(), RecorderError>;

    /// Wait up to `timeout` for encoder output.
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> OutputStatus;

    /// Bytes of output slot `index`, already restricted to the valid range.
    fn output_buffer(&self, index: usize, info: &BufferInfo) -> &[u8];

    fn release_output_buffer(&mut self, index: usize);

    fn stop(&mut self);
}

/// Sink container writer.
pub trait MediaMuxer: Send {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, RecorderError>;

    fn start(&mut self) -> Result<(), RecorderError>;

    fn write_sample_data(&mut self, track: usize, data: &[u8], info: &BufferInfo) -> Result<(), RecorderError>;

    fn stop(&mut self) -> Result<(), RecorderError>;

    fn release(&mut self);
}

/// Platform entry point that creates encoder/muxer pairs for one transcode.
pub trait TranscoderBackend: Send + Sync {
    fn create_encoder(&self, config: &EncoderConfig) -> Result<Box<dyn AudioEncoder>, RecorderError>;

    /// Create an MPEG-4 muxer writing to `output_path`.
    fn create_muxer(&self, output_path: &Path) -> Result<Box<dyn MediaMuxer>, RecorderError>;
}
