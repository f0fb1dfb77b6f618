//! Capture process spawning and control.
//!
//! This module builds the scrcpy invocations for the video and audio bridges
//! and wraps the running child with control methods, including two-phase
//! graceful termination.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::MicSource;

/// Error type for process launch operations.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// The capture binary was not found.
    #[error("{program} not found")]
    NotFound { program: String },
    /// Permission denied when spawning.
    #[error("Permission denied spawning {program}")]
    PermissionDenied { program: String },
    /// A process with this logical name is already tracked.
    #[error("A process named {0:?} is already running")]
    DuplicateName(String),
    /// The child was spawned without the expected piped streams.
    #[error("Capture process streams not available")]
    NoStreams,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Classify an I/O error from a spawn attempt.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

/// An external command the supervisor can launch and track.
#[derive(Debug, Clone)]
pub struct CaptureCommand {
    program: String,
    args: Vec<String>,
}

impl CaptureCommand {
    /// The scrcpy invocation bridging a device camera into a v4l2 sink.
    ///
    /// Runs headless: no mirror window, no audio. The transport port must
    /// differ from the audio process's port.
    #[must_use]
    pub fn video(camera_id: &str, resolution: &str, fps: u32, sink: &Path, port: u16) -> Self {
        Self {
            program: "scrcpy".to_string(),
            args: vec![
                "--video-source=camera".to_string(),
                format!("--camera-id={camera_id}"),
                "--no-audio".to_string(),
                format!("--v4l2-sink={}", sink.display()),
                format!("--camera-size={resolution}"),
                format!("--camera-fps={fps}"),
                "--port".to_string(),
                port.to_string(),
                "--no-window".to_string(),
            ],
        }
    }

    /// The scrcpy invocation recording the device microphone as raw WAV into
    /// a named pipe.
    #[must_use]
    pub fn audio(source: MicSource, pipe: &Path, port: u16) -> Self {
        Self {
            program: "scrcpy".to_string(),
            args: vec![
                "--no-video".to_string(),
                "--no-playback".to_string(),
                format!("--audio-source={}", source.as_arg()),
                "--audio-codec=raw".to_string(),
                "--no-window".to_string(),
                format!("--record={}", pipe.display()),
                "--port".to_string(),
                port.to_string(),
                "--record-format=wav".to_string(),
            ],
        }
    }

    /// An arbitrary external command (used by tests and unusual setups).
    #[must_use]
    pub fn external(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// A running capture process.
#[derive(Debug)]
pub struct CaptureProcess {
    child: Child,
}

impl CaptureProcess {
    /// Spawn the command with both output streams piped for line reading.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the process fails to spawn.
    pub fn spawn(command: &CaptureCommand) -> Result<Self, LaunchError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LaunchError::from_io(&command.program, e))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a grace period.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the grace period.
    /// On other platforms, falls back to immediate kill. An already-exited
    /// process is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, grace: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(grace).await
        }

        #[cfg(not(unix))]
        {
            let _ = grace;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, grace: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Already exited.
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!(pid, "Grace period elapsed, force killing");
                self.child.kill().await
            }
        }
    }
}
