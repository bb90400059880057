use rayon::prelude::*;
use tracing::trace;

use crate::config::DetectionConfig;
use crate::detection::types::{Detection, Position};
use crate::video::types::Frame;

/// Brightest-point locator and speed estimator
///
/// The detector holds only immutable configuration. The previous position is
/// threaded through [`Detector::detect`] by the caller, which keeps the fold
/// over a frame stream explicit and repeatable.
#[derive(Debug, Clone)]
pub struct Detector {
    fps: f64,
    pixel_to_km_scale: f64,
    kernel: Vec<f32>,
}

impl Detector {
    /// Create a detector for a stream running at `fps`
    pub fn new(config: &DetectionConfig, fps: f64) -> Self {
        Self {
            fps,
            pixel_to_km_scale: config.pixel_to_km_scale,
            kernel: gaussian_kernel(config.blur_kernel_size),
        }
    }

    /// Locate the brightest smoothed pixel; ties go to the first in raster order
    pub fn locate(&self, frame: &Frame) -> Position {
        let (width, height) = frame.dimensions();
        let luma = luminance(frame);
        let smoothed = smooth(&luma, width as usize, height as usize, &self.kernel);
        let (x, y) = argmax_raster(&smoothed, width as usize);
        Position::new(x as u32, y as u32)
    }

    /// Speed implied by moving from `from` to `to` in one frame interval
    pub fn speed_between(&self, from: &Position, to: &Position) -> f64 {
        from.distance_to(to) * self.fps * self.pixel_to_km_scale
    }

    /// One step of the tracking fold
    ///
    /// Returns the frame's detection together with the position to pass as
    /// `prev` for the next frame. Speed is zero when there is no previous
    /// position.
    pub fn detect(&self, frame: &Frame, prev: Option<Position>) -> (Detection, Position) {
        let position = self.locate(frame);
        let speed_km_s = prev
            .map(|p| self.speed_between(&p, &position))
            .unwrap_or(0.0);

        trace!("frame {}: ({}, {}) {:.2} km/s", frame.index(), position.x, position.y, speed_km_s);

        let detection = Detection {
            frame_index: frame.index(),
            x: position.x,
            y: position.y,
            speed_km_s,
        };
        (detection, position)
    }

    /// Fold an in-memory frame sequence into detections
    pub fn track<I>(&self, frames: I) -> Vec<Detection>
    where
        I: IntoIterator<Item = Frame>,
    {
        frames
            .into_iter()
            .scan(None, |prev, frame| {
                let (detection, position) = self.detect(&frame, *prev);
                *prev = Some(position);
                Some(detection)
            })
            .collect()
    }
}

/// Normalized 1-D Gaussian of odd length `size`
///
/// σ follows the usual rule for deriving a sigma from a kernel size:
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    let size = size.max(1) | 1;
    if size == 1 {
        return vec![1.0];
    }

    let radius = (size / 2) as f64;
    let sigma = 0.3 * (radius - 1.0) + 0.8;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Single-channel brightness of every pixel, row-major
pub fn luminance(frame: &Frame) -> Vec<f32> {
    image::imageops::grayscale(frame.as_image())
        .into_raw()
        .into_iter()
        .map(f32::from)
        .collect()
}

/// Separable convolution with reflect-101 borders (`dcb|abcd|cba`)
fn smooth(values: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return values.to_vec();
    }
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0f32; values.len()];
    horizontal
        .par_chunks_mut(width)
        .zip(values.par_chunks(width))
        .for_each(|(out, row)| {
            for (x, slot) in out.iter_mut().enumerate() {
                *slot = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * row[reflect_101(x as isize + k as isize - radius, width)])
                    .sum();
            }
        });

    let mut vertical = vec![0f32; values.len()];
    vertical
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            for (x, slot) in out.iter_mut().enumerate() {
                *slot = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let sy = reflect_101(y as isize + k as isize - radius, height);
                        w * horizontal[sy * width + x]
                    })
                    .sum();
            }
        });

    vertical
}

fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let period = 2 * (len - 1);
    let mut i = i.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Index of the maximum as (x, y); only a strictly greater value replaces the
/// current best, so the earliest pixel in raster order wins ties
fn argmax_raster(values: &[f32], width: usize) -> (usize, usize) {
    let mut best_index = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best_value = v;
            best_index = i;
        }
    }
    if width == 0 {
        return (0, 0);
    }
    (best_index % width, best_index / width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_points(index: u64, width: u32, height: u32, points: &[(u32, u32)]) -> Frame {
        let mut frame = Frame::new_black(index, width, height);
        for &(x, y) in points {
            frame.set_pixel(x, y, [255, 255, 255]);
        }
        frame
    }

    fn detector(fps: f64) -> Detector {
        Detector::new(&DetectionConfig::default(), fps)
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(9);
        assert_eq!(kernel.len(), 9);
        let total: f32 = kernel.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        for i in 0..4 {
            assert_eq!(kernel[i], kernel[8 - i]);
            assert!(kernel[i] < kernel[i + 1]);
        }
        assert_eq!(gaussian_kernel(1), vec![1.0]);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 5), 3);
        assert_eq!(reflect_101(-7, 3), 1);
        assert_eq!(reflect_101(4, 1), 0);
    }

    #[test]
    fn test_locates_single_bright_pixel() {
        let frame = frame_with_points(0, 100, 100, &[(37, 62)]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(37, 62));
    }

    #[test]
    fn test_smoothing_suppresses_isolated_noise() {
        // A lone hot pixel loses to a slightly dimmer but larger blob
        let mut frame = Frame::new_black(0, 60, 60);
        frame.set_pixel(5, 5, [255, 255, 255]);
        for y in 38..43 {
            for x in 28..33 {
                frame.set_pixel(x, y, [200, 200, 200]);
            }
        }
        assert_eq!(detector(30.0).locate(&frame), Position::new(30, 40));

        let unsmoothed = Detector::new(
            &DetectionConfig { blur_kernel_size: 1, ..DetectionConfig::default() },
            30.0,
        );
        assert_eq!(unsmoothed.locate(&frame), Position::new(5, 5));
    }

    #[test]
    fn test_tie_breaks_in_raster_order() {
        let frame = frame_with_points(0, 100, 100, &[(5, 50), (5, 5)]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(5, 5));

        // Same row: leftmost wins
        let frame = frame_with_points(0, 100, 100, &[(70, 20), (30, 20)]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(30, 20));
    }

    #[test]
    fn test_uniform_frame_picks_origin() {
        let frame = Frame::new_filled(0, 16, 9, [80, 80, 80]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(0, 0));
    }

    #[test]
    fn test_three_frame_scenario() {
        let frames = vec![
            frame_with_points(0, 100, 100, &[(10, 10)]),
            frame_with_points(1, 100, 100, &[(10, 10)]),
            frame_with_points(2, 100, 100, &[(20, 10)]),
        ];

        let detections = detector(30.0).track(frames);
        assert_eq!(
            detections,
            vec![
                Detection { frame_index: 0, x: 10, y: 10, speed_km_s: 0.0 },
                Detection { frame_index: 1, x: 10, y: 10, speed_km_s: 0.0 },
                Detection { frame_index: 2, x: 20, y: 10, speed_km_s: 150000.0 },
            ]
        );
    }

    #[test]
    fn test_speed_matches_displacement() {
        let points = [(10, 10), (13, 14), (13, 14), (40, 2)];
        let frames: Vec<Frame> = points
            .iter()
            .enumerate()
            .map(|(i, &p)| frame_with_points(i as u64, 64, 64, &[p]))
            .collect();

        let det = detector(25.0);
        let detections = det.track(frames);
        assert_eq!(detections[0].speed_km_s, 0.0);
        for i in 1..detections.len() {
            let prev = detections[i - 1].position();
            let cur = detections[i].position();
            assert_eq!(detections[i].speed_km_s, prev.distance_to(&cur) * 25.0 * 500.0);
        }
        assert_eq!(detections[1].speed_km_s, 5.0 * 25.0 * 500.0);
    }

    #[test]
    fn test_detect_is_deterministic() {
        let frame = frame_with_points(4, 80, 45, &[(12, 30), (60, 7)]);
        let det = detector(30.0);
        let prev = Some(Position::new(1, 1));
        assert_eq!(det.detect(&frame, prev), det.detect(&frame, prev));
    }

    #[test]
    fn test_tiny_frames() {
        let frame = frame_with_points(0, 1, 1, &[(0, 0)]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(0, 0));

        let frame = frame_with_points(0, 3, 2, &[(2, 1)]);
        assert_eq!(detector(30.0).locate(&frame), Position::new(2, 1));
    }
}
