use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Main error type for the AstroGuard pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not open video source: {0}")]
    Source(#[from] SourceError),

    #[error("Frame decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Video encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline cancelled after {frames_processed} frames")]
    Cancelled { frames_processed: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Failures while opening a container (the `SourceOpenError` family)
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Video file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Could not launch {tool}: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Could not probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("No video stream in {path}")]
    NoVideoStream { path: PathBuf },

    #[error("Invalid stream metadata for {path}: {details}")]
    InvalidMetadata { path: PathBuf, details: String },

    #[error("No readable frames in {path}")]
    NoFrames { path: PathBuf },
}

/// A frame failed to decode after the stream was opened
#[derive(Error, Debug)]
#[error("frame {frame_index}: {reason}")]
pub struct DecodeError {
    pub frame_index: u64,
    pub reason: String,
}

/// Failures while creating or feeding the output container
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Could not create writer for {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Codec '{codec}' is not supported by the installed encoder")]
    UnsupportedCodec { codec: String },

    #[error("Writing frame {frame_index} failed: {reason}")]
    WriteFailed { frame_index: u64, reason: String },

    #[error("Frame {frame_index} is {actual:?}, writer expects {expected:?}")]
    FrameMismatch {
        frame_index: u64,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Finalizing output failed: {reason}")]
    FinalizeFailed { reason: String },

    #[error("Annotate pass produced {written} frames, detect pass produced {expected}")]
    FrameCountMismatch { written: u64, expected: u64 },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Best-effort deletion of a temporary file failed. Logged, never returned to callers.
#[derive(Error, Debug)]
#[error("Could not remove temporary file {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Convenience type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification carried in the boundary error payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceOpen,
    Decode,
    EncoderOpen,
    Encode,
    Config,
    Cancelled,
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // A missing decoder is our deployment problem, not a bad upload
            Self::Source(SourceError::ToolUnavailable { .. }) => ErrorKind::Internal,
            Self::Source(_) => ErrorKind::SourceOpen,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Encode(EncodeError::OpenFailed { .. })
            | Self::Encode(EncodeError::UnsupportedCodec { .. }) => ErrorKind::EncoderOpen,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Io(_) | Self::Worker(_) => ErrorKind::Internal,
        }
    }

    /// Open and validation failures are the caller's fault; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::SourceOpen | ErrorKind::Config)
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Source(SourceError::NotFound { path }) => {
                format!("Could not open video file '{}'. Please check the file exists.", path.display())
            }
            Self::Source(SourceError::NoFrames { path }) => {
                format!("Video file '{}' contains no readable frames.", path.display())
            }
            Self::Source(SourceError::ToolUnavailable { tool, .. }) => {
                format!("'{}' is required to read video files. Please install FFmpeg.", tool)
            }
            Self::Encode(EncodeError::UnsupportedCodec { codec }) => {
                format!("The installed FFmpeg cannot encode '{}'.", codec)
            }
            Self::Cancelled { .. } => "Processing was cancelled.".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let missing: PipelineError = SourceError::NotFound { path: "nope.mp4".into() }.into();
        assert_eq!(missing.kind(), ErrorKind::SourceOpen);
        assert!(missing.is_client_error());

        let codec: PipelineError = EncodeError::UnsupportedCodec { codec: "libvpx".into() }.into();
        assert_eq!(codec.kind(), ErrorKind::EncoderOpen);
        assert!(!codec.is_client_error());

        let write: PipelineError = EncodeError::WriteFailed { frame_index: 3, reason: "broken pipe".into() }.into();
        assert_eq!(write.kind(), ErrorKind::Encode);

        let cancelled = PipelineError::Cancelled { frames_processed: 7 };
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert!(!cancelled.is_client_error());
    }

    #[test]
    fn test_missing_tool_is_server_side() {
        let err: PipelineError = SourceError::ToolUnavailable {
            tool: "ffprobe".into(),
            reason: "No such file or directory".into(),
        }.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_client_error());
        assert!(err.user_message().contains("ffprobe"));
    }

    #[test]
    fn test_user_message_mentions_path() {
        let err: PipelineError = SourceError::NotFound { path: "/tmp/clip.mp4".into() }.into();
        assert!(err.user_message().contains("/tmp/clip.mp4"));
    }
}
