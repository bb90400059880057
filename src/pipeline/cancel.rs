use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::error::{PipelineError, Result};

/// Cooperative cancellation flag checked by the pipeline between frames
///
/// Clones share the same flag, so one clone can be handed to a signal handler
/// while another travels with the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`PipelineError::Cancelled`] once cancellation was requested
    pub fn check(&self, frames_processed: u64) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled { frames_processed })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(token.check(0).is_ok());

        handle.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(12), Err(PipelineError::Cancelled { frames_processed: 12 })));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
