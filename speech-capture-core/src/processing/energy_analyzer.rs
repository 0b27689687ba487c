/// Energy-based speech boundary detector.
///
/// Each captured frame is reduced to a scaled mean-square energy. The first
/// frames of a recording establish a noise floor; speech starts after a short
/// run of frames well above the floor and stops after a long run of frames
/// well below the loudest frame seen.
use crate::traits::signal_analyzer::SignalAnalyzer;

const MAX_SHORT: f32 = 32767.0;
/// Nominal frame length used to normalise the energy.
const NOMINAL_FRAME_LEN: f32 = 512.0;
/// Frames averaged to establish the noise floor.
const NOISE_FLOOR_FRAMES: usize = 10;
/// Margin in dB above the floor (start) or below the peak (stop).
const ENERGY_THRESHOLD_DB: f32 = 15.0;
/// Roughly 100 ms of loud frames.
const START_SPURT_FRAMES: u32 = 3;
/// Roughly 2 s of quiet frames.
const END_SPURT_FRAMES: u32 = 60;

#[derive(Debug, Clone, Default)]
pub struct EnergyAnalyzer {
    floor_accumulator: f32,
    floor_frames: usize,
    noise_floor_db: Option<f32>,
    max_energy_db: f32,
    spurt_frames: u32,
    start_frame: Option<usize>,
    stop_frame: Option<usize>,
}

impl EnergyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaled mean-square energy of a frame, saturated to `i16`.
    pub fn frame_energy(frame: &[i16]) -> i16 {
        let sum_of_squares: f32 = frame
            .iter()
            .map(|&s| {
                let normalized = s as f32 / MAX_SHORT;
                normalized * normalized
            })
            .sum();
        (sum_of_squares / NOMINAL_FRAME_LEN * MAX_SHORT * 10.0) as i16
    }

    /// Noise floor in dB once enough frames have been seen.
    pub fn noise_floor_db(&self) -> Option<f32> {
        self.noise_floor_db
    }

    /// History index where speech was detected to start.
    pub fn start_frame(&self) -> Option<usize> {
        self.start_frame
    }

    pub fn stop_frame(&self) -> Option<usize> {
        self.stop_frame
    }

    fn log_energy(value: i16) -> f32 {
        10.0 * (value.max(1) as f32).log10()
    }

    /// Feed one history value into the floor estimate. Returns true once the
    /// floor is known.
    fn accumulate_floor(&mut self, latest: i16) -> bool {
        if self.noise_floor_db.is_some() {
            return true;
        }
        self.floor_accumulator += latest.max(1) as f32;
        self.floor_frames += 1;
        if self.floor_frames == NOISE_FLOOR_FRAMES {
            let mean = self.floor_accumulator / NOISE_FLOOR_FRAMES as f32;
            let floor = 10.0 * mean.log10();
            log::debug!("noise floor established at {:.1} dB", floor);
            self.noise_floor_db = Some(floor);
        }
        false
    }
}

impl SignalAnalyzer for EnergyAnalyzer {
    fn representative_sample(&mut self, frame: &[i16]) -> i16 {
        Self::frame_energy(frame)
    }

    fn speech_started(&mut self, history: &[i16]) -> bool {
        let Some(&latest) = history.last() else {
            return false;
        };
        if !self.accumulate_floor(latest) {
            return false;
        }
        let Some(floor) = self.noise_floor_db else {
            return false;
        };

        let current = Self::log_energy(latest);
        if current > floor + ENERGY_THRESHOLD_DB {
            self.spurt_frames += 1;
            if self.spurt_frames >= START_SPURT_FRAMES {
                self.start_frame = Some(history.len().saturating_sub(self.spurt_frames as usize));
                // Counter is reused for the stop spurt.
                self.spurt_frames = 0;
                return true;
            }
        } else {
            self.spurt_frames = 0;
        }
        false
    }

    fn speech_stopped(&mut self, history: &[i16]) -> bool {
        let Some(&latest) = history.last() else {
            return false;
        };
        let current = Self::log_energy(latest);
        self.max_energy_db = self.max_energy_db.max(current);

        if current < self.max_energy_db - ENERGY_THRESHOLD_DB {
            self.spurt_frames += 1;
            if self.spurt_frames >= END_SPURT_FRAMES {
                self.stop_frame = Some(history.len().saturating_sub(self.spurt_frames as usize));
                return true;
            }
        } else {
            self.spurt_frames = 0;
        }
        false
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
