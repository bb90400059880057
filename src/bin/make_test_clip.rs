// Writes a synthetic clip with a bright dot moving at a constant pixel
// velocity, for end-to-end checks of the detector against real codecs.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};

use astroguard::config::{EncoderConfig, FfmpegConfig};
use astroguard::video::{FfmpegBackend, Frame, MediaBackend, VideoMetadata};

#[derive(Parser)]
#[command(name = "make_test_clip", about = "Generate a synthetic moving-dot video")]
struct Args {
    /// Output video file
    output: PathBuf,

    #[arg(long, default_value_t = 60)]
    frames: u32,

    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Horizontal step per frame in pixels
    #[arg(long, default_value_t = 3, allow_hyphen_values = true)]
    dx: i32,

    /// Vertical step per frame in pixels
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    dy: i32,

    /// Radius of the dot in pixels
    #[arg(long, default_value_t = 2)]
    radius: u32,

    /// FFmpeg encoder to use
    #[arg(long, default_value = "libvpx")]
    codec: String,

    /// Path to the ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    if args.width == 0 || args.height == 0 || args.frames == 0 {
        bail!("width, height and frames must be non-zero");
    }

    let metadata = VideoMetadata::new(args.fps, args.width, args.height, args.frames as u64);
    let encoder = EncoderConfig {
        codec: args.codec.clone(),
        ..EncoderConfig::default()
    };
    let backend = FfmpegBackend::new(FfmpegConfig {
        ffmpeg_path: args.ffmpeg.clone(),
        ..FfmpegConfig::default()
    });

    info!("🎬 Writing {} frames of {}x{} @ {} fps to {:?}",
          args.frames, args.width, args.height, args.fps, args.output);

    let mut sink = backend.open_sink(&args.output, &metadata, &encoder)?;
    let start = (args.width as i32 / 4, args.height as i32 / 4);

    for i in 0..args.frames {
        let x = start.0 + args.dx * i as i32;
        let y = start.1 + args.dy * i as i32;
        sink.write(&dot_frame(i as u64, &args, x, y))?;
    }

    let encoded = sink.finish()?;
    println!("{}", serde_json::to_string_pretty(&encoded)?);

    let expected = (args.dx as f64).hypot(args.dy as f64) * args.fps;
    info!("Expected speed: {:.2} px/s (multiply by the km-per-pixel scale)", expected);
    Ok(())
}

/// Dark frame with a white disc centered at (cx, cy); off-frame parts are clipped
fn dot_frame(index: u64, args: &Args, cx: i32, cy: i32) -> Frame {
    let mut frame = Frame::new_filled(index, args.width, args.height, [8, 8, 12]);
    let r = args.radius as i32;

    for y in (cy - r)..=(cy + r) {
        for x in (cx - r)..=(cx + r) {
            let inside = (x - cx).pow(2) + (y - cy).pow(2) <= r * r;
            if inside && x >= 0 && y >= 0 && (x as u32) < args.width && (y as u32) < args.height {
                frame.set_pixel(x as u32, y as u32, [255, 255, 255]);
            }
        }
    }
    frame
}
