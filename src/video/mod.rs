//! # Video I/O Module
//!
//! Decoding input containers into frames and encoding annotated frames back
//! into a container. FFmpeg is driven as an external process over raw RGB
//! pipes, so nothing links against libav.

pub mod types;
pub mod backend;
pub mod memory;
pub mod ffmpeg;

mod source;
mod encoder;

pub use types::{Frame, VideoMetadata};
pub use backend::{FfmpegBackend, MediaBackend};
pub use memory::MemoryBackend;
pub use source::{FfmpegSource, FrameSource};
pub use encoder::{EncodedVideo, FfmpegEncoder, FrameSink};

pub(crate) use encoder::remove_partial;
