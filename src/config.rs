use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the AstroGuard pipeline
///
/// Every entry point takes one of these explicitly; nothing in the crate reads
/// process-wide defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Localization and speed estimation
    pub detection: DetectionConfig,

    /// Overlay rendering
    pub overlay: OverlayConfig,

    /// Output container settings
    pub encoder: EncoderConfig,

    /// External tool locations
    pub ffmpeg: FfmpegConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: PipelineConfig = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.overlay.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Kilometres represented by one pixel of displacement per frame interval
    pub pixel_to_km_scale: f64,

    /// Side of the square smoothing kernel; must be odd. 1 disables smoothing.
    pub blur_kernel_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pixel_to_km_scale: 500.0,
            blur_kernel_size: 9,
        }
    }
}

impl DetectionConfig {
    fn validate(&self) -> Result<()> {
        if !self.pixel_to_km_scale.is_finite() || self.pixel_to_km_scale <= 0.0 {
            return Err(invalid("detection.pixel_to_km_scale", self.pixel_to_km_scale).into());
        }

        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(invalid("detection.blur_kernel_size", self.blur_kernel_size).into());
        }

        Ok(())
    }
}

/// Overlay configuration. Colors are RGB, positions are pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Radius of the circular position marker
    pub marker_radius: u32,

    /// Stroke width of the marker
    pub marker_thickness: u32,

    pub marker_color: [u8; 3],

    /// Number of past positions drawn as a trail; 0 disables the trail
    pub trail_length: usize,

    pub trail_color: [u8; 3],

    /// Offset of the speed label from the marker center
    pub label_offset: (i32, i32),

    pub label_color: [u8; 3],

    /// Top-left anchor of the summary lines
    pub stats_origin: (i32, i32),

    /// Vertical distance between summary lines
    pub stats_line_spacing: i32,

    pub stats_color: [u8; 3],

    /// Pixel multiplier for the bitmap font; glyphs are 5x7 at scale 1
    pub text_scale: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            marker_radius: 20,
            marker_thickness: 2,
            marker_color: [255, 0, 0],
            trail_length: 60,
            trail_color: [255, 160, 0],
            label_offset: (25, -10),
            label_color: [255, 255, 0],
            stats_origin: (10, 30),
            stats_line_spacing: 30,
            stats_color: [0, 255, 0],
            text_scale: 2,
        }
    }
}

impl OverlayConfig {
    /// Largest marker radius accepted, in pixels
    pub const MAX_MARKER_RADIUS: u32 = 4096;

    /// Largest bitmap font multiplier accepted
    pub const MAX_TEXT_SCALE: u32 = 64;

    fn validate(&self) -> Result<()> {
        if self.marker_radius == 0 || self.marker_radius > Self::MAX_MARKER_RADIUS {
            return Err(invalid("overlay.marker_radius", self.marker_radius).into());
        }

        if self.marker_thickness == 0 || self.marker_thickness > self.marker_radius {
            return Err(invalid("overlay.marker_thickness", self.marker_thickness).into());
        }

        if self.text_scale == 0 || self.text_scale > Self::MAX_TEXT_SCALE {
            return Err(invalid("overlay.text_scale", self.text_scale).into());
        }

        Ok(())
    }
}

/// Output encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// FFmpeg encoder name; `libvpx` produces browser-safe VP8
    pub codec: String,

    /// Extension of the output container, which also selects the muxer
    pub container_extension: String,

    /// Target bitrate passed to the encoder
    pub bitrate: String,

    /// Encoder thread count
    pub threads: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "libvpx".to_string(),
            container_extension: "webm".to_string(),
            bitrate: "1M".to_string(),
            threads: num_cpus::get(),
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(invalid("encoder.codec", &self.codec).into());
        }

        if self.container_extension.trim().is_empty() || self.container_extension.contains('.') {
            return Err(invalid("encoder.container_extension", &self.container_extension).into());
        }

        if self.threads == 0 {
            return Err(invalid("encoder.threads", self.threads).into());
        }

        Ok(())
    }
}

/// Where to find the FFmpeg command line tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}
