pub mod config;
pub mod detector_core;

pub use config::DetectorConfig;
pub use detector_core::ViolationDetector;
