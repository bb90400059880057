use serde::Serialize;

use crate::detection::{Detection, DetectionSummary};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::pipeline::engine::DetectionRun;
use crate::video::types::VideoMetadata;

/// Boundary payload for detect-only requests
///
/// Serializes as `{"status": "success", ...}` or `{"status": "error", ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DetectionResponse {
    Success {
        frames_detected: usize,
        partial: bool,
        data: Vec<Detection>,
        metadata: VideoMetadata,
        summary: DetectionSummary,
    },
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(skip)]
        client_error: bool,
    },
}

impl DetectionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// HTTP status a server would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Error { client_error: true, .. } => 400,
            Self::Error { kind: ErrorKind::Cancelled, .. } => 503,
            Self::Error { .. } => 500,
        }
    }

    /// Serialize to JSON, optionally indented
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl From<DetectionRun> for DetectionResponse {
    fn from(run: DetectionRun) -> Self {
        Self::Success {
            frames_detected: run.detections.len(),
            partial: run.partial,
            data: run.detections,
            metadata: run.metadata,
            summary: run.summary,
        }
    }
}

impl From<PipelineError> for DetectionResponse {
    fn from(err: PipelineError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.user_message(),
            client_error: err.is_client_error(),
        }
    }
}

impl From<Result<DetectionRun>> for DetectionResponse {
    fn from(result: Result<DetectionRun>) -> Self {
        match result {
            Ok(run) => run.into(),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use serde_json::Value;

    fn run() -> DetectionRun {
        let detections = vec![
            Detection { frame_index: 0, x: 10, y: 10, speed_km_s: 0.0 },
            Detection { frame_index: 1, x: 20, y: 10, speed_km_s: 150000.0 },
        ];
        DetectionRun {
            metadata: VideoMetadata::new(30.0, 100, 100, 2),
            summary: DetectionSummary::from_detections(&detections),
            detections,
            partial: false,
            decode_error: None,
        }
    }

    #[test]
    fn test_success_shape() {
        let response = DetectionResponse::from(run());
        assert!(response.is_success());
        assert_eq!(response.status_code(), 200);

        let json: Value = serde_json::from_str(&response.to_json(false).unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["frames_detected"], 2);
        assert_eq!(json["partial"], false);
        assert_eq!(json["data"][1]["frame"], 1);
        assert_eq!(json["data"][1]["speed_km_s"], 150000.0);
        assert_eq!(json["metadata"]["width"], 100);
        assert_eq!(json["summary"]["total_detections"], 2);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_error_shape() {
        let err: PipelineError = SourceError::NotFound { path: "missing.mp4".into() }.into();
        let response = DetectionResponse::from(Err::<DetectionRun, _>(err));
        assert!(!response.is_success());
        assert_eq!(response.status_code(), 400);

        let json: Value = serde_json::from_str(&response.to_json(true).unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "source_open");
        assert!(json["message"].as_str().unwrap().contains("missing.mp4"));
        assert!(json.get("data").is_none());
        assert!(json.get("client_error").is_none());
    }

    #[test]
    fn test_server_side_failures() {
        let cancelled = DetectionResponse::from(PipelineError::Cancelled { frames_processed: 3 });
        assert_eq!(cancelled.status_code(), 503);

        let io = DetectionResponse::from(PipelineError::Worker("panicked".into()));
        assert_eq!(io.status_code(), 500);
    }
}
