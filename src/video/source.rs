use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::error::{DecodeError, Result, SourceError};
use crate::video::ffmpeg;
use crate::video::types::{Frame, VideoMetadata};

/// An opened video container yielding frames in order
///
/// A source is finite and cannot be rewound; open it again for another pass.
/// Dropping a source releases its decoder.
pub trait FrameSource: Send {
    /// Stream properties, fixed for the lifetime of the source
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the next frame
    ///
    /// Returns `Ok(None)` once the stream is exhausted, and keeps doing so on
    /// further calls.
    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError>;
}

/// Decodes a container through an `ffmpeg` child process emitting packed RGB frames
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    pending: Option<Frame>,
    next_index: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path`, start the decoder and read the first frame
    ///
    /// Fails with a [`SourceError`] when the file is missing, has no video
    /// stream, or decodes to zero frames.
    pub fn open(ffmpeg_bin: &Path, ffprobe_bin: &Path, path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SourceError::NotFound { path: path.to_path_buf() }.into());
        }

        let metadata = ffmpeg::probe(ffprobe_bin, path)?;

        let mut cmd = Command::new(ffmpeg_bin);
        cmd.args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0",
                "-an", "-sn",
                "-fps_mode", "passthrough",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-",
            ]);

        let source = Self::spawn(cmd, path, metadata)?;

        info!("Opened {} ({}x{} @ {:.2} fps, {} frames declared)",
              path.display(), source.metadata.width, source.metadata.height,
              source.metadata.fps, source.metadata.frame_count);

        Ok(source)
    }

    /// Start `cmd` as the decoder for `path` and read the first frame
    fn spawn(mut cmd: Command, path: &Path, metadata: VideoMetadata) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::ToolUnavailable {
                tool: cmd.get_program().to_string_lossy().into_owned(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = ffmpeg::drain_stderr(child.stderr.take());

        let mut source = Self {
            path: path.to_path_buf(),
            metadata,
            child: Some(child),
            stdout,
            stderr,
            pending: None,
            next_index: 0,
            finished: false,
        };

        match source.read_frame() {
            Ok(Some(frame)) => source.pending = Some(frame),
            Ok(None) => return Err(SourceError::NoFrames { path: source.path.clone() }.into()),
            Err(e) => {
                return Err(SourceError::ProbeFailed {
                    path: source.path.clone(),
                    reason: e.reason,
                }.into())
            }
        }

        Ok(source)
    }

    fn read_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        let index = self.next_index;
        let (width, height) = self.metadata.dimensions();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        match read_chunk(stdout, index, width, height) {
            Ok(Chunk::Frame(frame)) => {
                self.next_index += 1;
                Ok(Some(frame))
            }
            Ok(Chunk::End) => {
                self.finish(index)?;
                Ok(None)
            }
            Ok(Chunk::Truncated { filled }) => {
                self.finished = true;
                let stderr = self.shutdown();
                Err(DecodeError {
                    frame_index: index,
                    reason: format!(
                        "truncated frame ({} of {} bytes){}",
                        filled, self.metadata.frame_bytes(), suffix(&stderr)
                    ),
                })
            }
            Err(e) => {
                self.finished = true;
                let stderr = self.shutdown();
                Err(DecodeError {
                    frame_index: index,
                    reason: format!("pipe read failed: {}{}", e, suffix(&stderr)),
                })
            }
        }
    }

    /// Reap the decoder after a clean end of stream
    fn finish(&mut self, index: u64) -> std::result::Result<(), DecodeError> {
        self.finished = true;
        self.stdout = None;

        let status = match self.child.take() {
            Some(mut child) => child.wait().map_err(|e| DecodeError {
                frame_index: index,
                reason: format!("waiting for decoder failed: {}", e),
            })?,
            None => return Ok(()),
        };

        let stderr = ffmpeg::collect_stderr(self.stderr.take());
        if status.success() {
            debug!("Decoder for {} exited after {} frames", self.path.display(), index);
            Ok(())
        } else {
            Err(DecodeError {
                frame_index: index,
                reason: format!("decoder exited with {}{}", status, suffix(&stderr)),
            })
        }
    }

    /// Kill the decoder and return its diagnostics
    fn shutdown(&mut self) -> String {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill decoder for {}: {}", self.path.display(), e);
            }
            let _ = child.wait();
        }
        ffmpeg::collect_stderr(self.stderr.take())
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.read_frame()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!("Releasing decoder for {}", self.path.display());
            self.shutdown();
        }
    }
}

/// One frame-sized read from the decoder pipe
#[derive(Debug)]
enum Chunk {
    Frame(Frame),
    /// Clean end of stream on a frame boundary
    End,
    /// The stream ended partway through a frame
    Truncated { filled: usize },
}

fn read_chunk<R: Read>(reader: &mut R, index: u64, width: u32, height: u32) -> std::io::Result<Chunk> {
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    let filled = read_full(reader, &mut buffer)?;

    if filled == 0 {
        return Ok(Chunk::End);
    }
    if filled < buffer.len() {
        return Ok(Chunk::Truncated { filled });
    }

    match Frame::from_rgb_bytes(index, width, height, buffer) {
        Some(frame) => Ok(Chunk::Frame(frame)),
        None => Ok(Chunk::Truncated { filled }),
    }
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per call, like a pipe
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_read_full_across_short_reads() {
        let mut reader = Trickle { inner: Cursor::new(vec![7u8; 10]), chunk: 3 };
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 8);
        assert_eq!(buf, [7u8; 8]);

        let mut rest = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut rest).unwrap(), 2);
        assert_eq!(read_full(&mut reader, &mut rest).unwrap(), 0);
    }

    #[test]
    fn test_read_chunk_reassembles_frames_from_short_reads() {
        let mut bytes = vec![10u8; 12];
        bytes.extend(vec![20u8; 12]);
        let mut reader = Trickle { inner: Cursor::new(bytes), chunk: 5 };

        let Chunk::Frame(first) = read_chunk(&mut reader, 0, 2, 2).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(first.get_pixel(1, 1), [10, 10, 10]);

        let Chunk::Frame(second) = read_chunk(&mut reader, 1, 2, 2).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(second.index(), 1);
        assert_eq!(second.get_pixel(0, 0), [20, 20, 20]);

        assert!(matches!(read_chunk(&mut reader, 2, 2, 2).unwrap(), Chunk::End));
    }

    #[test]
    fn test_read_chunk_reports_truncated_frame() {
        let mut reader = Trickle { inner: Cursor::new(vec![0u8; 19]), chunk: 4 };

        assert!(matches!(read_chunk(&mut reader, 0, 2, 2).unwrap(), Chunk::Frame(_)));
        assert!(matches!(
            read_chunk(&mut reader, 1, 2, 2).unwrap(),
            Chunk::Truncated { filled: 7 }
        ));
    }

    #[cfg(unix)]
    fn shell_source(script: &str) -> Result<FfmpegSource> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        FfmpegSource::spawn(cmd, Path::new("clip.mp4"), VideoMetadata::new(30.0, 2, 2, 2))
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_clean_end_of_stream() {
        let mut source = shell_source("head -c 24 /dev/zero").unwrap();

        assert_eq!(source.next_frame().unwrap().unwrap().index(), 0);
        assert_eq!(source.next_frame().unwrap().unwrap().index(), 1);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_truncated_frame_is_decode_error() {
        let mut source = shell_source("head -c 18 /dev/zero").unwrap();

        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert_eq!(err.frame_index, 1);
        assert!(err.reason.contains("truncated frame (6 of 12 bytes)"));

        // The source stays exhausted after a failure
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_failure_exit_is_decode_error() {
        let mut source = shell_source("head -c 24 /dev/zero; echo 'corrupt packet' >&2; exit 1").unwrap();

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert_eq!(err.frame_index, 2);
        assert!(err.reason.contains("corrupt packet"));
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_without_frames_is_source_error() {
        let result = shell_source("exit 0");
        assert!(matches!(
            result,
            Err(crate::error::PipelineError::Source(SourceError::NoFrames { .. }))
        ));

        let result = shell_source("echo 'moov atom not found' >&2; exit 1");
        match result {
            Err(crate::error::PipelineError::Source(SourceError::ProbeFailed { reason, .. })) => {
                assert!(reason.contains("moov atom not found"));
            }
            _ => panic!("expected ProbeFailed"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let result = FfmpegSource::open(
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            Path::new("/no/such/clip.mp4"),
        );
        assert!(matches!(
            result,
            Err(crate::error::PipelineError::Source(SourceError::NotFound { .. }))
        ));
    }
}
