//! # Pipeline Module
//!
//! The two-pass orchestrator and everything it owns for the length of a run:
//! cancellation, staged uploads and the boundary response payload.

pub mod cancel;
pub mod engine;
pub mod response;
pub mod scratch;

pub use cancel::CancellationToken;
pub use engine::{DetectionRun, OutputArtifact, PersistError, Pipeline};
pub use response::DetectionResponse;
