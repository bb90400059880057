use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// A single decoded video frame
///
/// Wraps an RGB image buffer together with the frame's zero-based position
/// in its source.
#[derive(Clone, Debug)]
pub struct Frame {
    index: u64,
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(index: u64, buffer: RgbImage) -> Self {
        Self { index, buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(index: u64, width: u32, height: u32) -> Self {
        Self::new(index, ImageBuffer::new(width, height))
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(index: u64, width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self::new(index, buffer)
    }

    /// Create a frame from raw packed RGB bytes
    pub fn from_rgb_bytes(index: u64, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { index, buffer })
    }

    /// Zero-based position of this frame within its source
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Packed RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Stream properties read once when a source is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Frame count declared by the container; decoding may yield fewer
    pub frame_count: u64,
    pub duration_seconds: f64,
    pub codec: String,
}

impl VideoMetadata {
    /// Metadata for a stream with no container-reported duration
    pub fn new(fps: f64, width: u32, height: u32, frame_count: u64) -> Self {
        let duration_seconds = if fps > 0.0 { frame_count as f64 / fps } else { 0.0 };
        Self {
            fps,
            width,
            height,
            frame_count,
            duration_seconds,
            codec: "rawvideo".to_string(),
        }
    }

    /// Size in bytes of one packed RGB frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
