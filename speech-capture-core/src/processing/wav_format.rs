/// WAV container layout for the raw recording artifact.
///
/// The header is written once with both size fields zeroed and patched in
/// place when the writer closes.
use crate::models::config::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Size of the RIFF/WAVE header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size (`36 + payload`).
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the `data` sub-chunk size (`payload`).
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Generate the 44-byte header for mono 16-bit PCM with zeroed size fields.
///
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    0 (patched to 36 + payload on close)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16
/// [20-21]  1 (linear PCM)
/// [22-23]  1 channel
/// [24-27]  sample rate
/// [28-31]  byte rate = sample rate * 2
/// [32-33]  block align = 2
/// [34-35]  16 bits per sample
/// [36-39]  "data"
/// [40-43]  0 (patched to payload on close)
/// ```
pub fn placeholder_header(sample_rate: u32) -> [u8; WAV_HEADER_SIZE] {
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header
}

/// Header for the fixed capture rate.
pub fn default_header() -> [u8; WAV_HEADER_SIZE] {
    placeholder_header(SAMPLE_RATE)
}

/// On-disk bytes of the RIFF size field for a payload of `payload_bytes`.
///
/// Size fields are stored little-endian, i.e. the byte-reversed form of the
/// big-endian integer.
pub fn riff_size_bytes(payload_bytes: u32) -> [u8; 4] {
    (36 + payload_bytes).swap_bytes().to_be_bytes()
}

/// On-disk bytes of the data sub-chunk size field.
pub fn data_size_bytes(payload_bytes: u32) -> [u8; 4] {
    payload_bytes.swap_bytes().to_be_bytes()
}

/// Read a size field back from a header.
pub fn read_size_field(header: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([header[offset], header[offset + 1], header[offset + 2], header[offset + 3]])
}

/// Append `samples` to `out` as little-endian bytes.
pub fn extend_le_samples(out: &mut Vec<u8>, samples: &[i16]) {
    out.reserve(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}
