//! Shared plumbing for the `ffmpeg` / `ffprobe` subprocesses.

use std::io::Read;
use std::path::Path;
use std::process::{ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::video::types::VideoMetadata;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read stream metadata for the first video stream of `path`
pub fn probe(ffprobe: &Path, path: &Path) -> Result<VideoMetadata> {
    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration,codec_name:format=duration",
            "-of", "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SourceError::ToolUnavailable {
            tool: ffprobe.display().to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SourceError::ProbeFailed {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }.into());
    }

    parse_probe_json(path, &output.stdout)
}

fn parse_probe_json(path: &Path, json: &[u8]) -> Result<VideoMetadata> {
    let parsed: ProbeOutput = serde_json::from_slice(json).map_err(|e| SourceError::ProbeFailed {
        path: path.to_path_buf(),
        reason: format!("unreadable ffprobe output: {}", e),
    })?;

    let stream = parsed.streams.into_iter().next().ok_or_else(|| SourceError::NoVideoStream {
        path: path.to_path_buf(),
    })?;

    let invalid = |details: String| SourceError::InvalidMetadata {
        path: path.to_path_buf(),
        details,
    };

    let width = stream.width.filter(|w| *w > 0).ok_or_else(|| invalid("missing width".into()))?;
    let height = stream.height.filter(|h| *h > 0).ok_or_else(|| invalid("missing height".into()))?;

    let fps = stream.avg_frame_rate.as_deref().and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| invalid("missing frame rate".into()))?;

    let duration = stream.duration.as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let frame_count = stream.nb_frames.as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| duration.map(|d| (d * fps).round() as u64))
        .unwrap_or(0);

    debug!("Probed {}: {}x{} @ {:.3}fps, {} frames", path.display(), width, height, fps, frame_count);

    Ok(VideoMetadata {
        fps,
        width,
        height,
        frame_count,
        duration_seconds: duration.unwrap_or(frame_count as f64 / fps),
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Parse an ffprobe rational such as `30000/1001`; zero or malformed rates yield `None`
pub fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };

    (value.is_finite() && value > 0.0).then_some(value)
}

/// Check whether the installed ffmpeg lists `codec` among its encoders
pub fn encoder_available(ffmpeg: &Path, codec: &str) -> std::io::Result<bool> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;

    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(listing_has_encoder(&listing, codec))
}

fn listing_has_encoder(listing: &str, codec: &str) -> bool {
    // Rows look like " V....D libvpx               libvpx VP8 (codec vp8)"
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|name| name == codec)
}

/// Collect a child's stderr on a helper thread so a chatty process never blocks on a full pipe
pub fn drain_stderr(stderr: Option<ChildStderr>) -> Option<JoinHandle<String>> {
    stderr.map(|mut stderr| {
        std::thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    })
}

/// Join a stderr collector, returning whatever the process printed
pub fn collect_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Format a frame rate for `-r` without losing precision
pub fn format_rate(fps: f64) -> String {
    format!("{}", fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("garbage"), None);
    }

    #[test]
    fn test_parse_probe_json() {
        let json = br#"{
            "streams": [{
                "codec_name": "h264",
                "width": 640,
                "height": 480,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "duration": "2.000000",
                "nb_frames": "60"
            }],
            "format": {"duration": "2.010000"}
        }"#;

        let meta = parse_probe_json(Path::new("clip.mp4"), json).unwrap();
        assert_eq!(meta.width, 640);
        assert_eq!(meta.height, 480);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.frame_count, 60);
        assert_eq!(meta.duration_seconds, 2.0);
        assert_eq!(meta.codec, "h264");
    }

    #[test]
    fn test_parse_probe_json_estimates_frame_count() {
        // Matroska/WebM streams usually omit nb_frames and the stream duration
        let json = br#"{
            "streams": [{"codec_name": "vp8", "width": 320, "height": 240,
                         "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "4.000000"}
        }"#;

        let meta = parse_probe_json(Path::new("clip.webm"), json).unwrap();
        assert_eq!(meta.fps, 25.0);
        assert_eq!(meta.frame_count, 100);
    }

    #[test]
    fn test_parse_probe_json_without_video() {
        let json = br#"{"streams": [], "format": {"duration": "1.0"}}"#;
        let err = parse_probe_json(Path::new("song.mp3"), json).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::Source(SourceError::NoVideoStream { .. })
        ));
    }

    #[test]
    fn test_listing_has_encoder() {
        let listing = "Encoders:\n ------\n V....D libvpx               libvpx VP8 (codec vp8)\n V....D libx264              libx264 H.264\n";
        assert!(listing_has_encoder(listing, "libvpx"));
        assert!(listing_has_encoder(listing, "libx264"));
        assert!(!listing_has_encoder(listing, "libvpx-vp9"));
    }
}
