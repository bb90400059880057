use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{CleanupError, Result};

/// Uploaded bytes persisted to a temporary file for the duration of one run
///
/// The file is deleted when the guard drops, whether the run succeeded or
/// not. Deletion failures are logged and swallowed.
pub struct ScratchInput {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl ScratchInput {
    /// Write `bytes` to a fresh temporary file with the given extension
    pub fn persist(bytes: &[u8], extension: &str) -> Result<Self> {
        let suffix = format!(".{}", extension);
        let mut file = Builder::new()
            .prefix("astroguard-in-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let path = file.path().to_path_buf();
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(Self { file: Some(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchInput {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(source) = file.close() {
                let err = CleanupError { path: self.path.clone(), source };
                warn!("{}", err);
            }
        }
    }
}

/// Reserve a path for an output artifact that outlives this process's scope
///
/// The file is created empty and kept; ownership passes to whoever receives
/// the path.
pub fn reserve_output(extension: &str) -> Result<PathBuf> {
    let suffix = format!(".{}", extension);
    let reserved = Builder::new()
        .prefix("astroguard-out-")
        .suffix(&suffix)
        .tempfile()?;
    let path = reserved
        .into_temp_path()
        .keep()
        .map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_input_removed_on_drop() {
        let scratch = ScratchInput::persist(b"not really a video", "mp4").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"not really a video");

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_reserved_output_is_kept() {
        let path = reserve_output("webm").unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("webm"));
        std::fs::remove_file(&path).unwrap();
    }
}
