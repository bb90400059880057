//! # AstroGuard
//!
//! Track the brightest moving object through a video clip, estimate its speed
//! and render an annotated copy of the clip.
//!
//! Each frame is converted to luminance, Gaussian-smoothed and searched for
//! its brightest point. Consecutive positions give a pixel displacement that a
//! calibration scale turns into km/s. A second pass over the same clip draws
//! a marker, a trail, the per-frame speed and the clip-wide summary, then
//! encodes the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use astroguard::{CancellationToken, Pipeline, PipelineConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let cancel = CancellationToken::new();
//!
//! let run = pipeline.run_detection_only("clip.mp4", &cancel)?;
//! println!("max speed {:.2} km/s", run.summary.max_speed_km_s);
//!
//! let artifact = pipeline.annotate_file("clip.mp4", "annotated.webm", &cancel)?;
//! println!("wrote {} frames", artifact.frames_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame decoding and encoding through FFmpeg, plus an in-memory backend
//! - [`detection`] - Brightest-point localization, speed and statistics
//! - [`overlay`] - Marker, trail and text rendering
//! - [`pipeline`] - Two-pass orchestration, cancellation and response payloads
//! - [`config`] - Configuration management

pub mod config;
pub mod detection;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::PipelineConfig,
    detection::{Detection, DetectionSummary, Detector},
    error::{PipelineError, Result},
    pipeline::{CancellationToken, DetectionResponse, DetectionRun, OutputArtifact, Pipeline},
    video::{Frame, MediaBackend, MemoryBackend, VideoMetadata},
};
