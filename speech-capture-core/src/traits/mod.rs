pub mod capture_device;
pub mod encoder;
pub mod headset;
pub mod listener;
pub mod permission;
pub mod signal_analyzer;
