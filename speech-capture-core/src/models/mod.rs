pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod transcode_report;
