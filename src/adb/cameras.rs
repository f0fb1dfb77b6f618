//! Camera capability listing.
//!
//! scrcpy reports each physical camera with its id, facing, default size and
//! frame rates, followed by an indented block of supported sizes:
//!
//! ```text
//! --camera-id=0    (back, 4000x3000, fps=[15, 30, 60])
//!     - 4000x3000
//!     - 1920x1080
//! ```

use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

/// How long to wait for the capability listing. Waking the camera HAL on some
/// devices takes tens of seconds.
const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker scrcpy prints when it cannot reach any device.
pub const NO_DEVICE_MARKER: &str = "Could not find any ADB device";

/// Error type for camera capability queries.
#[derive(thiserror::Error, Debug)]
pub enum CameraQueryError {
    /// The scrcpy binary was not found on PATH.
    #[error("scrcpy not found; install scrcpy")]
    NotFound,
    /// No device was reachable when the listing ran.
    #[error("No ADB device reachable")]
    NoDevice,
    /// The listing did not complete within the timeout.
    #[error("Timed out listing cameras")]
    Timeout,
    /// scrcpy ran but reported a failure.
    #[error("scrcpy failed: {stderr}")]
    CommandFailed { stderr: String },
    /// The listing pattern failed to compile.
    #[error("Invalid listing pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One physical camera as reported by scrcpy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Identifier passed to `--camera-id`.
    pub id: String,
    /// Facing reported by the device ("back", "front", "external").
    pub facing: String,
    /// Default capture size.
    pub default_resolution: String,
    /// Supported frame rates.
    pub fps: Vec<u32>,
    /// Supported capture sizes, in listing order.
    pub resolutions: Vec<String>,
}

impl CameraInfo {
    /// Highest supported frame rate, falling back to `fallback` when the
    /// listing carried no rates.
    #[must_use]
    pub fn max_fps(&self, fallback: u32) -> u32 {
        self.fps.iter().copied().max().unwrap_or(fallback)
    }

    #[must_use]
    pub fn supports_resolution(&self, resolution: &str) -> bool {
        self.resolutions.iter().any(|r| r == resolution)
    }

    #[must_use]
    pub fn supports_fps(&self, fps: u32) -> bool {
        self.fps.contains(&fps)
    }
}

/// Query scrcpy for the connected device's cameras.
///
/// # Errors
///
/// Returns `CameraQueryError::NoDevice` when scrcpy reports that no device is
/// reachable, regardless of its exit status.
pub async fn list_cameras() -> Result<Vec<CameraInfo>, CameraQueryError> {
    let output = tokio::time::timeout(
        LIST_TIMEOUT,
        Command::new("scrcpy").arg("--list-camera-sizes").output(),
    )
    .await
    .map_err(|_| CameraQueryError::Timeout)?
    .map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CameraQueryError::NotFound,
        _ => CameraQueryError::Io(e),
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains(NO_DEVICE_MARKER) {
        return Err(CameraQueryError::NoDevice);
    }
    if !output.status.success() {
        return Err(CameraQueryError::CommandFailed {
            stderr: stderr.trim().to_string(),
        });
    }

    let cameras = parse_camera_listing(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(count = cameras.len(), "Camera listing parsed");
    Ok(cameras)
}

/// Parse `scrcpy --list-camera-sizes` stdout.
///
/// Lines that match neither a camera header nor a size bullet are ignored;
/// size bullets before the first header are dropped.
///
/// # Errors
///
/// Returns `CameraQueryError::InvalidPattern` if a listing pattern fails to
/// compile.
pub fn parse_camera_listing(stdout: &str) -> Result<Vec<CameraInfo>, CameraQueryError> {
    let header = Regex::new(
        r"^--camera-id=(\d+)\s+\(([^,]+),\s*(\d+x\d+),\s*fps=\[([^\]]+)\]\)",
    )?;
    let size = Regex::new(r"^-\s*(\d+x\d+)$")?;

    let mut cameras: Vec<CameraInfo> = Vec::new();
    for line in stdout.lines().map(str::trim) {
        if let Some(caps) = header.captures(line) {
            cameras.push(CameraInfo {
                id: caps[1].to_string(),
                facing: caps[2].trim().to_string(),
                default_resolution: caps[3].to_string(),
                fps: caps[4]
                    .split(',')
                    .filter_map(|f| f.trim().parse().ok())
                    .collect(),
                resolutions: Vec::new(),
            });
        } else if let Some(caps) = size.captures(line) {
            if let Some(current) = cameras.last_mut() {
                current.resolutions.push(caps[1].to_string());
            }
        }
    }
    Ok(cameras)
}
