//! Host-side setup: v4l2loopback kernel module and PulseAudio virtual mic.
//!
//! One-shot commands run before supervision starts. Everything acquired here
//! is released by the cleanup coordinator.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::{AudioConfig, VideoConfig};
use crate::display;

/// Error type for host setup operations.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    /// Could not query loaded kernel modules.
    #[error("Failed to query kernel modules: {0}")]
    ModuleQuery(std::io::Error),
    /// modprobe failed.
    #[error("Failed to load v4l2loopback: {stderr}")]
    LoopbackLoad { stderr: String },
    /// The named pipe could not be created or replaced.
    #[error("Failed to create pipe at {path}: {source}")]
    PipeCreate {
        path: PathBuf,
        source: std::io::Error,
    },
    /// pactl could not load the pipe-source module.
    #[error("Failed to load PulseAudio pipe-source module: {stderr}")]
    AudioModuleLoad { stderr: String },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Named pipes are not available on this platform.
    #[cfg(not(unix))]
    #[error("Named pipes are not supported on this platform")]
    Unsupported,
}

/// Make sure the v4l2loopback module is loaded with our card label.
///
/// # Errors
///
/// Returns `SetupError` if the module listing or modprobe fails.
pub async fn ensure_loopback(config: &VideoConfig) -> Result<(), SetupError> {
    let lsmod = Command::new("lsmod")
        .output()
        .await
        .map_err(SetupError::ModuleQuery)?;

    let loaded = String::from_utf8_lossy(&lsmod.stdout)
        .lines()
        .any(|line| line.starts_with("v4l2loopback"));
    if loaded {
        tracing::debug!("v4l2loopback already loaded");
        return Ok(());
    }

    display::print_status("Loading v4l2loopback module (requires sudo)...");
    let output = Command::new("sudo")
        .args([
            "modprobe",
            "v4l2loopback",
            "devices=1",
            &format!("video_nr={}", config.video_nr),
            &format!("card_label={}", config.card_label),
            "exclusive_caps=1",
        ])
        .output()
        .await?;

    if !output.status.success() {
        return Err(SetupError::LoopbackLoad {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Handle for a loaded PulseAudio virtual microphone.
///
/// The module id is the opaque identifier `pactl unload-module` takes during
/// cleanup.
#[derive(Debug, Clone)]
pub struct VirtualMic {
    pub module_id: String,
    pub pipe_path: PathBuf,
}

/// Create the named pipe and load the PulseAudio pipe-source on top of it.
///
/// If the module load fails the freshly created pipe is removed again, so a
/// setup failure never leaves a half-acquired pair behind.
///
/// # Errors
///
/// Returns `SetupError` if the pipe cannot be created or pactl fails.
pub async fn create_virtual_mic(config: &AudioConfig) -> Result<VirtualMic, SetupError> {
    prepare_pipe(&config.pipe_path)?;

    let output = Command::new("pactl")
        .args([
            "load-module",
            "module-pipe-source",
            &format!("source_name={}", config.source_name),
            "channels=2",
            "format=s16le",
            "rate=48000",
            &format!("file={}", config.pipe_path.display()),
        ])
        .output()
        .await;

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            let _ = std::fs::remove_file(&config.pipe_path);
            return Err(SetupError::AudioModuleLoad {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Err(e) => {
            let _ = std::fs::remove_file(&config.pipe_path);
            return Err(SetupError::Io(e));
        }
    };

    let module_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::info!(module_id = %module_id, pipe = %config.pipe_path.display(), "Virtual microphone ready");

    Ok(VirtualMic {
        module_id,
        pipe_path: config.pipe_path.clone(),
    })
}

/// Replace any stale pipe from a previous run with a fresh FIFO.
fn prepare_pipe(path: &Path) -> Result<(), SetupError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| SetupError::PipeCreate {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    make_fifo(path)
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> Result<(), SetupError> {
    use nix::sys::stat::Mode;

    nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o644)).map_err(|e| {
        SetupError::PipeCreate {
            path: path.to_path_buf(),
            source: e.into(),
        }
    })
}

#[cfg(not(unix))]
fn make_fifo(_path: &Path) -> Result<(), SetupError> {
    Err(SetupError::Unsupported)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn test_prepare_pipe_creates_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");

        prepare_pipe(&path).unwrap();
        let file_type = std::fs::metadata(&path).unwrap().file_type();
        assert!(file_type.is_fifo());
    }

    #[test]
    fn test_prepare_pipe_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        std::fs::write(&path, b"stale").unwrap();

        prepare_pipe(&path).unwrap();
        let file_type = std::fs::metadata(&path).unwrap().file_type();
        assert!(file_type.is_fifo());
    }

    #[test]
    fn test_prepare_pipe_fails_in_missing_dir() {
        let path = PathBuf::from("/nonexistent-dir-for-adbcam-tests/pipe");
        assert!(matches!(
            prepare_pipe(&path),
            Err(SetupError::PipeCreate { .. })
        ));
    }
}
