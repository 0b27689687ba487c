use std::sync::Arc;

use crate::models::error::RecorderError;

/// A microphone opened for one recording session.
///
/// `stop` may be called from a different thread while `read` is blocked;
/// implementations must make the pending `read` return promptly (with `Ok(0)`
/// or an error) once stopped.
pub trait CaptureDevice: Send + Sync {
    /// Begin delivering samples.
    fn start(&self) -> Result<(), RecorderError>;

    /// Block until samples are available and copy up to `buffer.len()` of them.
    ///
    /// Returns the number of samples written into `buffer`.
    fn read(&self, buffer: &mut [i16]) -> Result<usize, RecorderError>;

    /// Stop capture and release the underlying device.
    fn stop(&self);
}

/// Platform entry point that allocates capture devices.
pub trait CaptureBackend: Send + Sync {
    /// Allocate a mono 16-bit device at `sample_rate`.
    ///
    /// Failures map to `RecorderError::DeviceInit`.
    fn open_device(&self, sample_rate: u32) -> Result<Arc<dyn CaptureDevice>, RecorderError>;
}
