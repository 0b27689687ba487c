pub mod energy_analyzer;
pub mod wav_format;
