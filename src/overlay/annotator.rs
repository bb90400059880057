use image::Rgb;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::config::OverlayConfig;
use crate::detection::{Detection, DetectionSummary};
use crate::overlay::glyphs;
use crate::video::types::Frame;

/// Label drawn beside the marker
pub fn speed_label(speed_km_s: f64) -> String {
    format!("Speed: {:.2} km/s", speed_km_s)
}

/// First summary line
pub fn average_label(summary: &DetectionSummary) -> String {
    format!("AVG SPEED: {:.2} km/s", summary.avg_speed_km_s)
}

/// Second summary line
pub fn count_label(summary: &DetectionSummary) -> String {
    format!("OBJECTS: {}", summary.total_detections)
}

/// Draws position markers and statistics onto copies of frames
///
/// Layers, bottom to top: trail, marker, speed label, summary lines.
#[derive(Debug, Clone)]
pub struct Annotator {
    config: OverlayConfig,
}

impl Annotator {
    pub fn new(config: &OverlayConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Annotate one frame with its detection and the clip summary
    pub fn annotate(&self, frame: &Frame, detection: &Detection, summary: &DetectionSummary) -> Frame {
        self.annotate_with_trail(frame, std::slice::from_ref(detection), summary)
    }

    /// Annotate one frame given the detections leading up to it
    ///
    /// The last element of `history` is the frame's own detection; earlier
    /// ones feed the trail. An empty history draws the summary only.
    pub fn annotate_with_trail(
        &self,
        frame: &Frame,
        history: &[Detection],
        summary: &DetectionSummary,
    ) -> Frame {
        let mut annotated = frame.clone();

        if let Some(current) = history.last() {
            self.draw_trail(&mut annotated, history);
            self.draw_marker(&mut annotated, current);

            let (dx, dy) = self.config.label_offset;
            self.draw_text(
                &mut annotated,
                &speed_label(current.speed_km_s),
                current.x as i32 + dx,
                current.y as i32 + dy,
                self.config.label_color,
            );
        }

        self.draw_summary(&mut annotated, summary);
        annotated
    }

    fn draw_trail(&self, frame: &mut Frame, history: &[Detection]) {
        let keep = self.config.trail_length.min(history.len());
        if keep < 2 {
            return;
        }

        let trail = &history[history.len() - keep..];
        let segments = trail.len() - 1;
        for (i, pair) in trail.windows(2).enumerate() {
            let strength = (i + 1) as f32 / segments as f32;
            let color = self.config.trail_color.map(|c| (c as f32 * strength).round() as u8);
            draw_line_segment_mut(
                frame.as_image_mut(),
                (pair[0].x as f32, pair[0].y as f32),
                (pair[1].x as f32, pair[1].y as f32),
                Rgb(color),
            );
        }
    }

    fn draw_marker(&self, frame: &mut Frame, detection: &Detection) {
        let center = (detection.x as i32, detection.y as i32);
        let radius = self.config.marker_radius as i32;
        let thickness = self.config.marker_thickness as i32;
        let inner = (radius - (thickness - 1) / 2).max(0);

        for r in inner..inner + thickness {
            draw_hollow_circle_mut(frame.as_image_mut(), center, r, Rgb(self.config.marker_color));
        }
    }

    fn draw_summary(&self, frame: &mut Frame, summary: &DetectionSummary) {
        let (x, y) = self.config.stats_origin;
        let spacing = self.config.stats_line_spacing;
        let color = self.config.stats_color;

        self.draw_text(frame, &average_label(summary), x, y, color);
        self.draw_text(frame, &count_label(summary), x, y + spacing, color);
    }

    /// Draw text with its baseline at `y`
    fn draw_text(&self, frame: &mut Frame, text: &str, x: i32, y: i32, color: [u8; 3]) {
        glyphs::draw_text(frame.as_image_mut(), text, x, y, self.config.text_scale, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: [u8; 3] = [255, 0, 0];
    const STATS: [u8; 3] = [0, 255, 0];

    fn summary() -> DetectionSummary {
        DetectionSummary { max_speed_km_s: 150000.0, avg_speed_km_s: 50000.0, total_detections: 3 }
    }

    fn detection(frame_index: u64, x: u32, y: u32) -> Detection {
        Detection { frame_index, x, y, speed_km_s: 1234.567 }
    }

    fn count_color(frame: &Frame, color: [u8; 3]) -> usize {
        frame.as_image().pixels().filter(|p| p.0 == color).count()
    }

    #[test]
    fn test_labels() {
        assert_eq!(speed_label(150000.0), "Speed: 150000.00 km/s");
        assert_eq!(speed_label(1.005), "Speed: 1.00 km/s");
        assert_eq!(average_label(&summary()), "AVG SPEED: 50000.00 km/s");
        assert_eq!(count_label(&summary()), "OBJECTS: 3");
    }

    #[test]
    fn test_annotate_leaves_input_untouched() {
        let annotator = Annotator::new(&OverlayConfig::default());
        let frame = Frame::new_black(4, 200, 150);

        let annotated = annotator.annotate(&frame, &detection(4, 100, 80), &summary());

        assert!(frame.as_image().pixels().all(|p| p.0 == [0, 0, 0]));
        assert_eq!(annotated.index(), 4);
        assert_eq!(annotated.dimensions(), frame.dimensions());
        assert!(count_color(&annotated, MARKER) > 0);
        assert!(count_color(&annotated, STATS) > 0);
    }

    #[test]
    fn test_marker_ring_is_centered() {
        let config = OverlayConfig { marker_thickness: 1, ..OverlayConfig::default() };
        let annotator = Annotator::new(&config);
        let frame = Frame::new_black(0, 200, 150);

        let annotated = annotator.annotate(&frame, &detection(0, 100, 100), &summary());

        assert_eq!(annotated.get_pixel(100 + 20, 100), MARKER);
        assert_eq!(annotated.get_pixel(100 - 20, 100), MARKER);
        assert_eq!(annotated.get_pixel(100, 100 + 20), MARKER);
        assert_ne!(annotated.get_pixel(100, 100), MARKER);
    }

    #[test]
    fn test_summary_drawn_without_detection() {
        let annotator = Annotator::new(&OverlayConfig::default());
        let frame = Frame::new_black(0, 320, 240);

        let annotated = annotator.annotate_with_trail(&frame, &[], &summary());
        assert_eq!(count_color(&annotated, MARKER), 0);
        assert!(count_color(&annotated, STATS) > 0);
    }

    #[test]
    fn test_trail_respects_length() {
        let config = OverlayConfig { trail_length: 0, ..OverlayConfig::default() };
        let trail_color = config.trail_color;
        let history: Vec<Detection> = (0..5).map(|i| detection(i, 150 + i as u32 * 10, 120)).collect();
        let frame = Frame::new_black(4, 320, 240);

        let without = Annotator::new(&config).annotate_with_trail(&frame, &history, &summary());
        assert_eq!(count_color(&without, trail_color), 0);

        let config = OverlayConfig { trail_length: 5, ..config };
        let with = Annotator::new(&config).annotate_with_trail(&frame, &history, &summary());
        // Newest segment is drawn at full strength
        assert!(count_color(&with, trail_color) > 0);
    }

    #[test]
    fn test_marker_near_edge_does_not_panic() {
        let annotator = Annotator::new(&OverlayConfig::default());
        let frame = Frame::new_black(0, 30, 20);
        let annotated = annotator.annotate(&frame, &detection(0, 29, 0), &summary());
        assert_eq!(annotated.dimensions(), (30, 20));
    }

    #[test]
    fn test_label_grows_with_text_scale() {
        let frame = Frame::new_black(0, 320, 240);
        let label = [255, 255, 0];

        let small = OverlayConfig { text_scale: 1, ..OverlayConfig::default() };
        let large = OverlayConfig { text_scale: 3, ..OverlayConfig::default() };
        let small = Annotator::new(&small).annotate(&frame, &detection(0, 100, 120), &summary());
        let large = Annotator::new(&large).annotate(&frame, &detection(0, 100, 120), &summary());

        assert!(count_color(&large, label) > count_color(&small, label));
    }
}
