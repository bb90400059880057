//! # Detection Module
//!
//! Brightest-point localization, per-frame speed estimation and clip-wide
//! statistics.
//!
//! ## Usage
//!
//! ```rust
//! use astroguard::config::DetectionConfig;
//! use astroguard::detection::{Detector, DetectionSummary};
//! use astroguard::video::Frame;
//!
//! let mut first = Frame::new_black(0, 100, 100);
//! first.set_pixel(10, 10, [255, 255, 255]);
//! let mut second = Frame::new_black(1, 100, 100);
//! second.set_pixel(20, 10, [255, 255, 255]);
//!
//! let detector = Detector::new(&DetectionConfig::default(), 30.0);
//! let detections = detector.track(vec![first, second]);
//! assert_eq!(detections[1].speed_km_s, 150000.0);
//!
//! let summary = DetectionSummary::from_detections(&detections);
//! assert_eq!(summary.total_detections, 2);
//! ```

pub mod detector;
pub mod stats;
pub mod types;

pub use detector::Detector;
pub use stats::DetectionSummary;
pub use types::{Detection, Position};
