//! AdbCam - use an Android device as a webcam and microphone on Linux.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adbcam::adb::{self, CameraInfo};
use adbcam::capture::CaptureCommand;
use adbcam::config::{CaptureConfig, ConfigLoader, MicSource};
use adbcam::display;
use adbcam::session::{CleanupCoordinator, SessionRunner};
use adbcam::setup;

#[derive(Parser)]
#[command(
    name = "adbcam",
    about = "Use an Android device as a webcam and microphone on Linux",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file path (overrides the default search locations).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bridge the device camera and microphone into virtual devices.
    Run {
        /// Camera id (default: first listed camera).
        #[arg(long)]
        camera_id: Option<String>,
        /// Capture resolution, e.g. 1920x1080 (default: 1920x1080 when
        /// supported, otherwise the camera default).
        #[arg(long)]
        resolution: Option<String>,
        /// Frame rate (default: camera maximum).
        #[arg(long)]
        fps: Option<u32>,
        /// Device microphone source.
        #[arg(long, value_enum)]
        mic_source: Option<MicSource>,
    },
    /// List connected ADB devices.
    Devices,
    /// List the device's cameras and supported modes.
    Cameras,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            camera_id,
            resolution,
            fps,
            mic_source,
        } => run_capture(config, camera_id, resolution, fps, mic_source).await,
        Commands::Devices => list_devices().await,
        Commands::Cameras => list_cameras().await,
    }
}

/// The camera mode a run captures with.
#[derive(Debug, PartialEq, Eq)]
struct CameraSelection {
    camera_id: String,
    resolution: String,
    fps: u32,
}

/// Resolve CLI overrides against the reported camera capabilities.
///
/// An empty listing (device refuses camera enumeration) falls back to
/// defaults rather than failing: scrcpy itself may still manage to open the
/// camera.
fn select_capture_mode(
    cameras: &[CameraInfo],
    camera_id: Option<String>,
    resolution: Option<String>,
    fps: Option<u32>,
    default_fps: u32,
) -> Result<CameraSelection, String> {
    const FALLBACK_RESOLUTION: &str = "1920x1080";

    if cameras.is_empty() {
        tracing::warn!("No cameras reported; using defaults");
        return Ok(CameraSelection {
            camera_id: camera_id.unwrap_or_else(|| "0".to_string()),
            resolution: resolution.unwrap_or_else(|| FALLBACK_RESOLUTION.to_string()),
            fps: fps.unwrap_or(default_fps),
        });
    }

    let camera = match &camera_id {
        Some(id) => cameras
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| {
                let available: Vec<&str> = cameras.iter().map(|c| c.id.as_str()).collect();
                format!(
                    "Unknown camera id {id:?}; available: {}",
                    available.join(", ")
                )
            })?,
        None => &cameras[0],
    };

    let resolution = match resolution {
        Some(r) => {
            if camera.resolutions.is_empty() || camera.supports_resolution(&r) {
                r
            } else {
                return Err(format!(
                    "Camera {} does not support {r}; supported: {}",
                    camera.id,
                    camera.resolutions.join(", ")
                ));
            }
        }
        None if camera.supports_resolution(FALLBACK_RESOLUTION) => {
            FALLBACK_RESOLUTION.to_string()
        }
        None => camera.default_resolution.clone(),
    };

    let fps = match fps {
        Some(f) => {
            if camera.fps.is_empty() || camera.supports_fps(f) {
                f
            } else {
                return Err(format!(
                    "Camera {} does not support {f} fps; supported: {:?}",
                    camera.id, camera.fps
                ));
            }
        }
        None => camera.max_fps(default_fps),
    };

    Ok(CameraSelection {
        camera_id: camera.id.clone(),
        resolution,
        fps,
    })
}

async fn run_capture(
    config: CaptureConfig,
    camera_id: Option<String>,
    resolution: Option<String>,
    fps: Option<u32>,
    mic_source: Option<MicSource>,
) -> ExitCode {
    // Startup preconditions: a reachable device and its camera listing.
    display::print_status("Checking for connected ADB devices...");
    let devices = match adb::list_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    if devices.is_empty() {
        display::print_error(
            "No ADB devices in the device state; check USB debugging and authorization",
        );
        return ExitCode::FAILURE;
    }
    display::print_status(&format!("Found device(s): {}", devices.join(", ")));

    display::print_status("Querying camera capabilities...");
    let cameras = match adb::list_cameras().await {
        Ok(cameras) => cameras,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let selection = match select_capture_mode(
        &cameras,
        camera_id,
        resolution,
        fps,
        config.video.default_fps,
    ) {
        Ok(selection) => selection,
        Err(message) => {
            display::print_error(&message);
            return ExitCode::FAILURE;
        }
    };
    display::print_status(&format!(
        "Capturing camera {} at {} / {} fps",
        selection.camera_id, selection.resolution, selection.fps
    ));

    if let Err(e) = setup::ensure_loopback(&config.video).await {
        display::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }

    display::print_status(&format!(
        "Setting up virtual microphone {:?}...",
        config.audio.source_name
    ));
    let mic = match setup::create_virtual_mic(&config.audio).await {
        Ok(mic) => mic,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let cleanup = CleanupCoordinator::new(config.supervision.grace_period())
        .with_audio_module(mic.module_id.clone())
        .with_pipe(mic.pipe_path.clone());

    let mic_source = mic_source.unwrap_or(config.audio.source);
    let video = CaptureCommand::video(
        &selection.camera_id,
        &selection.resolution,
        selection.fps,
        &config.video.device,
        config.video.port,
    );
    let audio = CaptureCommand::audio(mic_source, &config.audio.pipe_path, config.audio.port);

    display::print_ready(
        &config.video.device,
        &config.video.card_label,
        &config.audio.source_name,
    );

    let mut runner = SessionRunner::new(&config.supervision, cleanup);
    let outcome = runner.run(video, audio).await;
    tracing::info!(outcome = ?outcome, "Run finished");

    if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn list_devices() -> ExitCode {
    match adb::list_devices().await {
        Ok(devices) if devices.is_empty() => {
            display::print_error("No ADB devices in the device state");
            ExitCode::FAILURE
        }
        Ok(devices) => {
            for serial in devices {
                println!("{serial}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn list_cameras() -> ExitCode {
    match adb::list_cameras().await {
        Ok(cameras) if cameras.is_empty() => {
            display::print_error("No cameras reported by the device");
            ExitCode::FAILURE
        }
        Ok(cameras) => {
            for camera in cameras {
                println!(
                    "{}: {} (default {}, fps {:?})",
                    camera.id, camera.facing, camera.default_resolution, camera.fps
                );
                for resolution in &camera.resolutions {
                    println!("    - {resolution}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
