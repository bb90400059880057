use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use astroguard::{
    CancellationToken, DetectionResponse, Pipeline, PipelineConfig, PipelineError,
};

#[derive(Parser)]
#[command(
    name = "astroguard",
    version,
    about = "Track the brightest moving object in a video and estimate its speed",
    long_about = "AstroGuard locates the brightest object in every frame of a clip, converts its frame-to-frame displacement into a speed, and can render an annotated copy of the clip with markers and statistics."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the object in every frame and print the result as JSON
    Detect {
        /// Input video file
        input: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Detect, then write an annotated copy of the clip
    Annotate {
        /// Input video file
        input: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration to a TOML file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting AstroGuard v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            PipelineConfig::from_file(config_path)?
        }
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::InitConfig { path } => {
            config.save_to_file(&path)?;
            info!("Configuration written to {:?}", path);
            Ok(ExitCode::SUCCESS)
        }
        Command::Detect { input, pretty } => {
            let pipeline = Arc::new(Pipeline::new(config)?);
            let cancel = install_interrupt_handler()?;

            let result = pipeline.detect_path_async(input, cancel).await;
            let response = DetectionResponse::from(result);
            println!("{}", response.to_json(pretty)?);

            Ok(exit_code_for(&response))
        }
        Command::Annotate { input, output } => {
            let pipeline = Arc::new(Pipeline::new(config)?);
            let cancel = install_interrupt_handler()?;

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Could not read {:?}", input))?;

            match pipeline.annotate_upload_async(bytes, cancel).await {
                Ok(artifact) => {
                    if artifact.partial {
                        warn!("Input could only be partially decoded");
                    }
                    let summary = artifact.summary;
                    let frames = artifact.frames_written;
                    let saved = match artifact.persist(&output) {
                        Ok(saved) => saved,
                        Err(err) => {
                            error!("{}", err);
                            if let Err(e) = err.artifact.remove() {
                                warn!("Could not remove temporary output: {}", e);
                            }
                            return Ok(ExitCode::FAILURE);
                        }
                    };
                    info!(
                        "Annotated {} frames, max {:.2} km/s, avg {:.2} km/s -> {:?}",
                        frames, summary.max_speed_km_s, summary.avg_speed_km_s, saved
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    error!("{}", err.user_message());
                    Ok(exit_code_for_error(&err))
                }
            }
        }
    }
}

/// Wire Ctrl-C to a fresh cancellation token
fn install_interrupt_handler() -> Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || handle.cancel()).context("Error setting Ctrl-C handler")?;
    Ok(cancel)
}

fn exit_code_for(response: &DetectionResponse) -> ExitCode {
    match response.status_code() {
        200 => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn exit_code_for_error(err: &PipelineError) -> ExitCode {
    if err.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}
