use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::detection::{Detection, DetectionSummary, Detector, Position};
use crate::error::{EncodeError, PipelineError, Result, SourceError};
use crate::overlay::Annotator;
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::scratch::{reserve_output, ScratchInput};
use crate::video::{remove_partial, EncodedVideo, FfmpegBackend, MediaBackend, VideoMetadata};

/// Extension given to staged uploads; the decoder sniffs the real format
const UPLOAD_EXTENSION: &str = "mp4";

/// Outcome of a detect pass
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRun {
    pub metadata: VideoMetadata,
    pub detections: Vec<Detection>,
    pub summary: DetectionSummary,
    /// Decoding stopped early; `detections` covers only the readable prefix
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

/// An encoded output file handed over to the caller
///
/// Nothing deletes the file automatically. Call [`OutputArtifact::persist`]
/// to move it somewhere permanent or [`OutputArtifact::remove`] once it has
/// been served.
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    path: PathBuf,
    pub metadata: VideoMetadata,
    pub summary: DetectionSummary,
    pub partial: bool,
    pub frames_written: u64,
    pub file_size: u64,
}

impl OutputArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MIME type matching the container extension
    pub fn media_type(&self) -> &'static str {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some("webm") => "video/webm",
            Some("mp4") => "video/mp4",
            Some("mkv") => "video/x-matroska",
            Some("avi") => "video/x-msvideo",
            _ => "application/octet-stream",
        }
    }

    /// Download name for the artifact, e.g. `analysis_result.webm`
    pub fn suggested_filename(&self) -> String {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("analysis_result.{}", ext),
            None => "analysis_result".to_string(),
        }
    }

    /// Move the artifact to `destination`, returning its new path
    ///
    /// On failure the artifact comes back inside the error, still owning its
    /// file, so the caller can retry or remove it.
    pub fn persist<P: AsRef<Path>>(self, destination: P) -> std::result::Result<PathBuf, PersistError> {
        let destination = destination.as_ref();
        if std::fs::rename(&self.path, destination).is_err() {
            // Rename fails across filesystems; fall back to copy and delete
            if let Err(source) = std::fs::copy(&self.path, destination) {
                return Err(PersistError {
                    artifact: self,
                    destination: destination.to_path_buf(),
                    source,
                });
            }
            remove_partial(&self.path);
        }
        info!("💾 Output saved to {}", destination.display());
        Ok(destination.to_path_buf())
    }

    /// Delete the artifact
    pub fn remove(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        debug!("Removed output artifact {}", self.path.display());
        Ok(())
    }
}

/// [`OutputArtifact::persist`] failed; the artifact is handed back untouched
#[derive(Error, Debug)]
#[error("Could not save output to {}: {source}", .destination.display())]
pub struct PersistError {
    pub artifact: OutputArtifact,
    pub destination: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Two-pass detect-then-annotate orchestrator
///
/// The pipeline follows a clear sequence:
/// 1. Detect pass - decode every frame, locate the object and measure its speed
/// 2. Statistics - reduce the detections to a clip-wide summary
/// 3. Annotate pass - decode again, draw each frame's overlay and encode it
///
/// Every decoder, encoder and temporary file is released on all exit paths.
#[derive(Debug, Clone)]
pub struct Pipeline<B: MediaBackend = FfmpegBackend> {
    config: PipelineConfig,
    backend: B,
}

impl Pipeline<FfmpegBackend> {
    /// Pipeline backed by the installed FFmpeg tools named in `config`
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let backend = FfmpegBackend::new(config.ffmpeg.clone());
        Self::with_backend(config, backend)
    }
}

impl<B: MediaBackend> Pipeline<B> {
    pub fn with_backend(config: PipelineConfig, backend: B) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Detect-only over a video file
    pub fn run_detection_only<P: AsRef<Path>>(
        &self,
        source: P,
        cancel: &CancellationToken,
    ) -> Result<DetectionRun> {
        let source = source.as_ref();
        info!("🔭 Detecting in {}", source.display());
        self.detect_pass(source, cancel)
    }

    /// Detect-only over uploaded bytes
    pub fn run_detection_from_bytes(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<DetectionRun> {
        let input = ScratchInput::persist(bytes, UPLOAD_EXTENSION)?;
        info!("🔭 Detecting in uploaded clip ({} bytes)", bytes.len());
        self.detect_pass(input.path(), cancel)
    }

    /// Full pipeline over uploaded bytes
    ///
    /// The upload is staged in a temporary file that is gone when this
    /// returns. The encoded output lands in a fresh temporary path owned by
    /// the returned artifact.
    pub fn run_detect_and_annotate(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<OutputArtifact> {
        let input = ScratchInput::persist(bytes, UPLOAD_EXTENSION)?;
        let output = reserve_output(&self.config.encoder.container_extension)?;
        info!("🎬 Annotating uploaded clip ({} bytes)", bytes.len());

        let result = self.detect_and_annotate(input.path(), &output, cancel);
        if result.is_err() {
            remove_partial(&output);
        }
        result
    }

    /// Full pipeline from `input` to a caller-chosen `output` path
    pub fn annotate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
        cancel: &CancellationToken,
    ) -> Result<OutputArtifact> {
        let (input, output) = (input.as_ref(), output.as_ref());
        info!("🎬 Annotating {} -> {}", input.display(), output.display());
        self.detect_and_annotate(input, output, cancel)
    }

    fn detect_and_annotate(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<OutputArtifact> {
        let run = self.detect_pass(input, cancel)?;
        let encoded = self.annotate_pass(input, output, &run, cancel)?;

        info!(
            "🎉 Wrote {} annotated frames ({} bytes) to {}",
            encoded.frame_count, encoded.file_size, encoded.path.display()
        );

        Ok(OutputArtifact {
            path: encoded.path,
            metadata: run.metadata,
            summary: run.summary,
            partial: run.partial,
            frames_written: encoded.frame_count,
            file_size: encoded.file_size,
        })
    }

    // ==========================================
    // PASS 1: DETECTION
    // ==========================================

    fn detect_pass(&self, input: &Path, cancel: &CancellationToken) -> Result<DetectionRun> {
        let mut source = self.backend.open_source(input)?;
        let metadata = source.metadata().clone();
        debug!(
            "Source: {}x{} @ {:.3} fps, {} frames declared",
            metadata.width, metadata.height, metadata.fps, metadata.frame_count
        );

        let detector = Detector::new(&self.config.detection, metadata.fps);
        let mut detections = Vec::with_capacity(metadata.frame_count.min(1 << 16) as usize);
        let mut prev: Option<Position> = None;
        let mut decode_error = None;

        loop {
            cancel.check(detections.len() as u64)?;
            match source.next_frame() {
                Ok(Some(frame)) => {
                    let (detection, position) = detector.detect(&frame, prev);
                    prev = Some(position);
                    detections.push(detection);
                }
                Ok(None) => break,
                Err(e) if detections.is_empty() => {
                    debug!("First frame failed to decode: {}", e);
                    break;
                }
                Err(e) => {
                    warn!("Decoding stopped early, keeping {} detections: {}", detections.len(), e);
                    decode_error = Some(e.to_string());
                    break;
                }
            }
        }
        drop(source);

        if detections.is_empty() {
            return Err(SourceError::NoFrames { path: input.to_path_buf() }.into());
        }

        let summary = DetectionSummary::from_detections(&detections);
        info!(
            "✅ Detect pass: {} frames, max {:.2} km/s, avg {:.2} km/s",
            summary.total_detections, summary.max_speed_km_s, summary.avg_speed_km_s
        );

        Ok(DetectionRun {
            metadata,
            detections,
            summary,
            partial: decode_error.is_some(),
            decode_error,
        })
    }

    // ==========================================
    // PASS 2: ANNOTATION
    // ==========================================

    fn annotate_pass(
        &self,
        input: &Path,
        output: &Path,
        run: &DetectionRun,
        cancel: &CancellationToken,
    ) -> Result<EncodedVideo> {
        let annotator = Annotator::new(&self.config.overlay);
        let mut source = self.backend.open_source(input)?;
        let mut sink = self.backend.open_sink(output, &run.metadata, &self.config.encoder)?;

        let trail_length = self.config.overlay.trail_length.max(1);
        let expected = run.detections.len() as u64;

        for i in 0..run.detections.len() {
            cancel.check(i as u64)?;

            let frame = source
                .next_frame()?
                .ok_or(EncodeError::FrameCountMismatch { written: i as u64, expected })?;

            let history = &run.detections[(i + 1).saturating_sub(trail_length)..=i];
            let annotated = annotator.annotate_with_trail(&frame, history, &run.summary);
            sink.write(&annotated)?;
        }
        drop(source);

        let encoded = sink.finish()?;
        if encoded.frame_count != expected {
            remove_partial(&encoded.path);
            return Err(EncodeError::FrameCountMismatch { written: encoded.frame_count, expected }.into());
        }
        Ok(encoded)
    }
}

impl<B: MediaBackend + 'static> Pipeline<B> {
    /// [`Pipeline::run_detection_only`] on the blocking thread pool
    pub async fn detect_path_async(
        self: Arc<Self>,
        source: PathBuf,
        cancel: CancellationToken,
    ) -> Result<DetectionRun> {
        tokio::task::spawn_blocking(move || self.run_detection_only(&source, &cancel))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    /// [`Pipeline::run_detect_and_annotate`] on the blocking thread pool
    pub async fn annotate_upload_async(
        self: Arc<Self>,
        bytes: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<OutputArtifact> {
        tokio::task::spawn_blocking(move || self.run_detect_and_annotate(&bytes, &cancel))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }
}
