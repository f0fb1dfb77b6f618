//! Tracking of launched capture processes.
//!
//! The supervisor owns every child for the duration of a run. Entries are
//! keyed by a logical name ("video", "audio"), kept in launch order, and
//! removed only on confirmed exit.

use std::time::Duration;

use tokio::process::{ChildStderr, ChildStdout};

use crate::capture::{CaptureCommand, CaptureProcess, LaunchError};

/// A tracked capture process.
#[derive(Debug)]
struct ManagedProcess {
    name: String,
    process: CaptureProcess,
}

/// Exit report produced by [`ProcessSupervisor::poll_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Logical name the process was launched under.
    pub name: String,
    /// Exit code, if the platform reported one.
    pub code: Option<i32>,
}

/// Output streams taken from a freshly launched process.
#[derive(Debug)]
pub struct LaunchedStreams {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Launches external processes and tracks their handles.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    registry: Vec<ManagedProcess>,
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a process and register it under `name`.
    ///
    /// Both output streams are taken from the child and handed back for
    /// monitoring; the handle itself stays with the supervisor.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::DuplicateName` if `name` is already tracked, or
    /// a spawn error if the process cannot be started.
    pub fn launch(
        &mut self,
        name: &str,
        command: &CaptureCommand,
    ) -> Result<LaunchedStreams, LaunchError> {
        if self.registry.iter().any(|entry| entry.name == name) {
            return Err(LaunchError::DuplicateName(name.to_string()));
        }

        let mut process = CaptureProcess::spawn(command)?;
        let stdout = process.take_stdout().ok_or(LaunchError::NoStreams)?;
        let stderr = process.take_stderr().ok_or(LaunchError::NoStreams)?;

        tracing::info!(
            name,
            program = command.program(),
            pid = process.id(),
            "Launched capture process"
        );

        self.registry.push(ManagedProcess {
            name: name.to_string(),
            process,
        });

        Ok(LaunchedStreams { stdout, stderr })
    }

    /// Report every tracked process that has exited, removing it.
    ///
    /// Non-blocking. A process whose state cannot be queried stays tracked
    /// with its status unknown.
    pub fn poll_all(&mut self) -> Vec<ProcessExit> {
        let mut exits = Vec::new();
        self.registry.retain_mut(|entry| match entry.process.try_wait() {
            Ok(Some(status)) => {
                exits.push(ProcessExit {
                    name: entry.name.clone(),
                    code: status.code(),
                });
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(name = %entry.name, error = %e, "Failed to query process state");
                true
            }
        });
        exits
    }

    /// Gracefully terminate every tracked process and empty the registry.
    ///
    /// Each child gets `grace` to exit after SIGTERM before it is force
    /// killed. Already-exited children are reaped without error.
    pub async fn terminate_all(&mut self, grace: Duration) {
        for mut entry in self.registry.drain(..) {
            tracing::info!(name = %entry.name, "Terminating capture process");
            if let Err(e) = entry.process.graceful_terminate(grace).await {
                tracing::warn!(name = %entry.name, error = %e, "Failed to terminate capture process");
            }
        }
    }

    /// True when no processes remain tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of tracked processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }
}
