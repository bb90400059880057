use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::{EncodeError, Result};
use crate::video::ffmpeg;
use crate::video::types::{Frame, VideoMetadata};

/// Represents a finished output container
#[derive(Debug, Clone, Serialize)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: u64,
    pub file_size: u64,
}

/// Ordered frame writer for one output container
///
/// Frames are written in call order. [`FrameSink::finish`] finalizes the
/// container; a sink dropped without finishing discards its partial output.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<EncodedVideo>;
}

/// Encodes packed RGB frames by piping them into an `ffmpeg` child process
pub struct FfmpegEncoder {
    output_path: PathBuf,
    expected: (u32, u32),
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
    frames_written: u64,
}

impl FfmpegEncoder {
    /// Start an encoder producing `output_path` at the input's fps and dimensions
    ///
    /// Fails with [`EncodeError::UnsupportedCodec`] or [`EncodeError::OpenFailed`]
    /// before any frame is accepted.
    pub fn open(
        ffmpeg_bin: &Path,
        output_path: &Path,
        metadata: &VideoMetadata,
        config: &EncoderConfig,
    ) -> Result<Self> {
        let available = ffmpeg::encoder_available(ffmpeg_bin, &config.codec)
            .map_err(|e| EncodeError::OpenFailed {
                path: output_path.to_path_buf(),
                reason: format!("could not run {}: {}", ffmpeg_bin.display(), e),
            })?;
        if !available {
            return Err(EncodeError::UnsupportedCodec { codec: config.codec.clone() }.into());
        }

        let size = format!("{}x{}", metadata.width, metadata.height);
        let rate = ffmpeg::format_rate(metadata.fps);
        let threads = config.threads.to_string();

        let mut cmd = Command::new(ffmpeg_bin);
        cmd.args(["-v", "error", "-nostdin", "-y"]);
        cmd.args([
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &size,
            "-r", &rate,
            "-i", "-",
        ]);
        cmd.args([
            "-an",
            "-c:v", &config.codec,
            "-b:v", &config.bitrate,
            "-pix_fmt", "yuv420p",
            "-threads", &threads,
            "-r", &rate,
        ]);
        cmd.arg(output_path);

        let encoder = Self::spawn(cmd, output_path, metadata)?;
        info!("Encoding {} ({} @ {} fps, {})", output_path.display(), size, rate, config.codec);
        Ok(encoder)
    }

    /// Start `cmd` as the encoder process, feeding it frames on stdin
    fn spawn(mut cmd: Command, output_path: &Path, metadata: &VideoMetadata) -> Result<Self> {
        debug!("Starting encoder: {:?}", cmd);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncodeError::OpenFailed {
                path: output_path.to_path_buf(),
                reason: format!("failed to spawn {:?}: {}", cmd.get_program(), e),
            })?;

        let stdin = child.stdin.take().map(BufWriter::new);
        let stderr = ffmpeg::drain_stderr(child.stderr.take());

        Ok(Self {
            output_path: output_path.to_path_buf(),
            expected: metadata.dimensions(),
            child: Some(child),
            stdin,
            stderr,
            frames_written: 0,
        })
    }

    fn abort(&mut self) -> String {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill encoder for {}: {}", self.output_path.display(), e);
            }
            let _ = child.wait();
        }
        let stderr = ffmpeg::collect_stderr(self.stderr.take());
        remove_partial(&self.output_path);
        stderr
    }
}

impl FrameSink for FfmpegEncoder {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != self.expected {
            return Err(EncodeError::FrameMismatch {
                frame_index: frame.index(),
                expected: self.expected,
                actual: frame.dimensions(),
            }.into());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(EncodeError::WriteFailed {
                frame_index: frame.index(),
                reason: "encoder already closed".to_string(),
            }.into());
        };

        if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
            let stderr = self.abort();
            return Err(EncodeError::WriteFailed {
                frame_index: frame.index(),
                reason: if stderr.is_empty() { e.to_string() } else { format!("{}: {}", e, stderr) },
            }.into());
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<EncodedVideo> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };
        // Dropping stdin above closes the pipe and lets ffmpeg finalize the container

        if let Err(e) = flushed {
            let stderr = self.abort();
            return Err(EncodeError::FinalizeFailed {
                reason: format!("flushing frames failed: {} {}", e, stderr),
            }.into());
        }

        let status = match self.child.take() {
            Some(mut child) => child.wait().map_err(|e| EncodeError::FinalizeFailed {
                reason: format!("waiting for encoder failed: {}", e),
            }),
            None => Err(EncodeError::FinalizeFailed { reason: "encoder already closed".to_string() }),
        };

        let stderr = ffmpeg::collect_stderr(self.stderr.take());
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                remove_partial(&self.output_path);
                return Err(e.into());
            }
        };

        if !status.success() {
            remove_partial(&self.output_path);
            return Err(EncodeError::FinalizeFailed {
                reason: format!("encoder exited with {}: {}", status, stderr),
            }.into());
        }

        let file_size = std::fs::metadata(&self.output_path).map(|m| m.len()).unwrap_or(0);
        info!("Encoded {} frames to {} ({} KB)",
              self.frames_written, self.output_path.display(), file_size / 1024);

        Ok(EncodedVideo {
            path: self.output_path.clone(),
            frame_count: self.frames_written,
            file_size,
        })
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            warn!("Encoder for {} dropped before finishing, discarding output", self.output_path.display());
            self.abort();
        }
    }
}

/// Remove a half-written output file, logging instead of failing
pub(crate) fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let err = crate::error::CleanupError { path: path.to_path_buf(), source: e };
            warn!("{}", err);
        }
    }
}
