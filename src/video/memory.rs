//! In-memory media backend.
//!
//! Serves a fixed list of decoded frames for any existing input path and
//! records everything written to its sinks. Used by the pipeline tests and by
//! callers that already hold decoded frames.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::EncoderConfig;
use crate::error::{DecodeError, EncodeError, Result, SourceError};
use crate::video::backend::MediaBackend;
use crate::video::encoder::{remove_partial, EncodedVideo, FrameSink};
use crate::video::source::FrameSource;
use crate::video::types::{Frame, VideoMetadata};

#[derive(Default)]
struct Recorded {
    metadata: Option<VideoMetadata>,
    codec: Option<String>,
    frames: Vec<Frame>,
}

struct Shared {
    metadata: VideoMetadata,
    frames: Vec<Frame>,
    decode_failure_at: Option<u64>,
    encode_failure_at: Option<u64>,
    unsupported_codecs: Vec<String>,
    sources_opened: AtomicUsize,
    recorded: Mutex<Recorded>,
}

/// Backend over a clip that is already decoded
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Serve `frames` with the given metadata. Frames are re-indexed from zero.
    pub fn new(metadata: VideoMetadata, frames: Vec<Frame>) -> Self {
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, f)| Frame::new(i as u64, f.as_image().clone()))
            .collect();

        Self {
            shared: Arc::new(Shared {
                metadata,
                frames,
                decode_failure_at: None,
                encode_failure_at: None,
                unsupported_codecs: Vec::new(),
                sources_opened: AtomicUsize::new(0),
                recorded: Mutex::new(Recorded::default()),
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut Shared)) -> Self {
        let mut shared = Arc::try_unwrap(self.shared).unwrap_or_else(|arc| Shared {
            metadata: arc.metadata.clone(),
            frames: arc.frames.clone(),
            decode_failure_at: arc.decode_failure_at,
            encode_failure_at: arc.encode_failure_at,
            unsupported_codecs: arc.unsupported_codecs.clone(),
            sources_opened: AtomicUsize::new(0),
            recorded: Mutex::new(Recorded::default()),
        });
        f(&mut shared);
        Self { shared: Arc::new(shared) }
    }

    /// Make every source fail to decode the frame at `index`
    pub fn fail_decode_at(self, index: u64) -> Self {
        self.configure(|s| s.decode_failure_at = Some(index))
    }

    /// Make every sink fail when asked to write the frame at `index`
    pub fn fail_encode_at(self, index: u64) -> Self {
        self.configure(|s| s.encode_failure_at = Some(index))
    }

    /// Reject `codec` when a sink is opened
    pub fn without_codec(self, codec: &str) -> Self {
        let codec = codec.to_string();
        self.configure(|s| s.unsupported_codecs.push(codec))
    }

    /// Number of sources opened so far
    pub fn sources_opened(&self) -> usize {
        self.shared.sources_opened.load(Ordering::SeqCst)
    }

    /// Frames accepted by the most recently finished sink
    pub fn encoded_frames(&self) -> Vec<Frame> {
        self.lock_recorded().frames.clone()
    }

    /// Metadata the most recently opened sink was created with
    pub fn sink_metadata(&self) -> Option<VideoMetadata> {
        self.lock_recorded().metadata.clone()
    }

    /// Codec the most recently opened sink was created with
    pub fn sink_codec(&self) -> Option<String> {
        self.lock_recorded().codec.clone()
    }

    fn lock_recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.shared.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MediaBackend for MemoryBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        if !path.is_file() {
            return Err(SourceError::NotFound { path: path.to_path_buf() }.into());
        }
        if self.shared.frames.is_empty() || self.shared.decode_failure_at == Some(0) {
            return Err(SourceError::NoFrames { path: path.to_path_buf() }.into());
        }

        self.shared.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            shared: Arc::clone(&self.shared),
            position: 0,
            failed: false,
        }))
    }

    fn open_sink(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        encoder: &EncoderConfig,
    ) -> Result<Box<dyn FrameSink>> {
        if self.shared.unsupported_codecs.iter().any(|c| c == &encoder.codec) {
            return Err(EncodeError::UnsupportedCodec { codec: encoder.codec.clone() }.into());
        }

        let file = File::create(path).map_err(|e| EncodeError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        {
            let mut recorded = self.lock_recorded();
            recorded.metadata = Some(metadata.clone());
            recorded.codec = Some(encoder.codec.clone());
            recorded.frames.clear();
        }

        Ok(Box::new(MemorySink {
            shared: Arc::clone(&self.shared),
            path: path.to_path_buf(),
            file: Some(file),
            expected: metadata.dimensions(),
            frames: Vec::new(),
        }))
    }
}

struct MemorySource {
    shared: Arc<Shared>,
    position: usize,
    failed: bool,
}

impl FrameSource for MemorySource {
    fn metadata(&self) -> &VideoMetadata {
        &self.shared.metadata
    }

    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        if self.failed {
            return Ok(None);
        }

        let index = self.position as u64;
        if self.shared.decode_failure_at == Some(index) {
            self.failed = true;
            return Err(DecodeError {
                frame_index: index,
                reason: "corrupt packet".to_string(),
            });
        }

        let frame = self.shared.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }
}

struct MemorySink {
    shared: Arc<Shared>,
    path: PathBuf,
    file: Option<File>,
    expected: (u32, u32),
    frames: Vec<Frame>,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != self.expected {
            return Err(EncodeError::FrameMismatch {
                frame_index: frame.index(),
                expected: self.expected,
                actual: frame.dimensions(),
            }.into());
        }

        if self.shared.encode_failure_at == Some(self.frames.len() as u64) {
            return Err(EncodeError::WriteFailed {
                frame_index: frame.index(),
                reason: "broken pipe".to_string(),
            }.into());
        }

        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<EncodedVideo> {
        let mut file = self.file.take().ok_or_else(|| EncodeError::FinalizeFailed {
            reason: "sink already finished".to_string(),
        })?;

        let manifest = format!(
            "frames={}\nsize={}x{}\n",
            self.frames.len(), self.expected.0, self.expected.1
        );
        if let Err(e) = file.write_all(manifest.as_bytes()) {
            remove_partial(&self.path);
            return Err(EncodeError::FinalizeFailed { reason: e.to_string() }.into());
        }

        let frames = std::mem::take(&mut self.frames);
        let frame_count = frames.len() as u64;
        self.shared
            .recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .frames = frames;

        Ok(EncodedVideo {
            path: self.path.clone(),
            frame_count,
            file_size: manifest.len() as u64,
        })
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            remove_partial(&self.path);
        }
    }
}
