use serde::{Deserialize, Serialize};

use crate::detection::types::Detection;

/// Clip-wide speed statistics
///
/// Only ever built from a complete detection sequence; there is no running
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub max_speed_km_s: f64,
    pub avg_speed_km_s: f64,
    pub total_detections: usize,
}

impl DetectionSummary {
    /// Reduce a finished detection sequence. An empty sequence yields zeros.
    pub fn from_detections(detections: &[Detection]) -> Self {
        if detections.is_empty() {
            return Self::default();
        }

        let total: f64 = detections.iter().map(|d| d.speed_km_s).sum();
        let max = detections
            .iter()
            .map(|d| d.speed_km_s)
            .fold(0.0_f64, f64::max);

        Self {
            max_speed_km_s: max,
            avg_speed_km_s: total / detections.len() as f64,
            total_detections: detections.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(frame_index: u64, speed_km_s: f64) -> Detection {
        Detection { frame_index, x: 0, y: 0, speed_km_s }
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = DetectionSummary::from_detections(&[]);
        assert_eq!(summary, DetectionSummary { max_speed_km_s: 0.0, avg_speed_km_s: 0.0, total_detections: 0 });
    }

    #[test]
    fn test_three_frame_summary() {
        let detections = [detection(0, 0.0), detection(1, 0.0), detection(2, 150000.0)];
        let summary = DetectionSummary::from_detections(&detections);
        assert_eq!(summary.max_speed_km_s, 150000.0);
        assert_eq!(summary.avg_speed_km_s, 50000.0);
        assert_eq!(summary.total_detections, 3);
    }

    #[test]
    fn test_average_is_plain_mean() {
        let speeds = [0.0, 1.5, 2.25, 10.0, 3.0];
        let detections: Vec<Detection> = speeds
            .iter()
            .enumerate()
            .map(|(i, &s)| detection(i as u64, s))
            .collect();

        let summary = DetectionSummary::from_detections(&detections);
        assert_eq!(summary.avg_speed_km_s, speeds.iter().sum::<f64>() / speeds.len() as f64);
        assert_eq!(summary.max_speed_km_s, 10.0);
    }
}
