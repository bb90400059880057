use std::path::Path;

use crate::config::{EncoderConfig, FfmpegConfig};
use crate::error::Result;
use crate::video::encoder::{FfmpegEncoder, FrameSink};
use crate::video::source::{FfmpegSource, FrameSource};
use crate::video::types::VideoMetadata;

/// Opens decoders and encoders for the pipeline
///
/// Each call returns an independent scoped resource, so the same file can be
/// opened once per pass.
pub trait MediaBackend: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn open_sink(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        encoder: &EncoderConfig,
    ) -> Result<Box<dyn FrameSink>>;
}

/// Backend driving the installed `ffmpeg` and `ffprobe` binaries
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    tools: FfmpegConfig,
}

impl FfmpegBackend {
    pub fn new(tools: FfmpegConfig) -> Self {
        Self { tools }
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let source = FfmpegSource::open(&self.tools.ffmpeg_path, &self.tools.ffprobe_path, path)?;
        Ok(Box::new(source))
    }

    fn open_sink(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        encoder: &EncoderConfig,
    ) -> Result<Box<dyn FrameSink>> {
        let sink = FfmpegEncoder::open(&self.tools.ffmpeg_path, path, metadata, encoder)?;
        Ok(Box::new(sink))
    }
}
