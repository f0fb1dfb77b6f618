//! Idempotent teardown of everything a run acquired.
//!
//! The same coordinator instance is reachable from the interrupt path, the
//! normal shutdown path, and early setup failures; an atomic latch makes the
//! sequence run at most once. Each step is best-effort: a failed release is
//! logged and the remaining steps still run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::capture::ProcessSupervisor;
use crate::display;

/// Pattern matched against full command lines when sweeping stray capture
/// processes left over from a crashed run.
const DEFAULT_PROCESS_SIGNATURE: &str = "scrcpy";

/// Coordinates release of host resources and tracked processes.
#[derive(Debug, Clone)]
pub struct CleanupCoordinator {
    ran: Arc<AtomicBool>,
    audio_module_id: Option<String>,
    pipe_path: Option<PathBuf>,
    process_signature: String,
    grace: Duration,
}

impl CleanupCoordinator {
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            ran: Arc::new(AtomicBool::new(false)),
            audio_module_id: None,
            pipe_path: None,
            process_signature: DEFAULT_PROCESS_SIGNATURE.to_string(),
            grace,
        }
    }

    /// Record the PulseAudio module id to unload.
    #[must_use]
    pub fn with_audio_module(mut self, module_id: impl Into<String>) -> Self {
        self.audio_module_id = Some(module_id.into());
        self
    }

    /// Record the named-pipe path to remove.
    #[must_use]
    pub fn with_pipe(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipe_path = Some(path.into());
        self
    }

    /// Override the stray-process sweep pattern (tests use an inert one).
    #[must_use]
    pub fn with_process_signature(mut self, signature: impl Into<String>) -> Self {
        self.process_signature = signature.into();
        self
    }

    /// Whether the teardown sequence has already run.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.ran.load(Ordering::SeqCst)
    }

    /// Run the teardown sequence at most once.
    ///
    /// Returns `true` if this call performed the sequence, `false` if it was
    /// a no-op because an earlier call already did.
    pub async fn run(&self, supervisor: &mut ProcessSupervisor) -> bool {
        if self.ran.swap(true, Ordering::SeqCst) {
            tracing::debug!("Cleanup already performed, skipping");
            return false;
        }

        display::print_status("Cleaning up...");

        self.unload_audio_module().await;
        self.remove_pipe();
        self.sweep_stray_processes().await;
        supervisor.terminate_all(self.grace).await;

        tracing::info!("Cleanup complete");
        true
    }

    async fn unload_audio_module(&self) {
        let Some(module_id) = &self.audio_module_id else {
            return;
        };
        match Command::new("pactl")
            .args(["unload-module", module_id])
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                tracing::debug!(module_id = %module_id, "Unloaded audio module");
            }
            Ok(output) => {
                tracing::warn!(
                    module_id = %module_id,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Failed to unload audio module"
                );
            }
            Err(e) => {
                tracing::warn!(module_id = %module_id, error = %e, "Failed to run pactl");
            }
        }
    }

    fn remove_pipe(&self) {
        let Some(path) = &self.pipe_path else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove pipe");
        } else {
            tracing::debug!(path = %path.display(), "Removed pipe");
        }
    }

    /// Kill capture processes this run never tracked, e.g. orphans from a
    /// previous crash. pkill exits non-zero when nothing matched, which is
    /// the common case.
    async fn sweep_stray_processes(&self) {
        if let Err(e) = Command::new("pkill")
            .args(["-f", &self.process_signature])
            .output()
            .await
        {
            tracing::warn!(error = %e, "Failed to sweep stray capture processes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inert_coordinator() -> CleanupCoordinator {
        CleanupCoordinator::new(Duration::from_millis(200))
            .with_process_signature("adbcam-test-signature-matches-nothing")
    }

    #[tokio::test]
    async fn test_runs_once_then_noops() {
        let coordinator = inert_coordinator();
        let mut supervisor = ProcessSupervisor::new();

        assert!(coordinator.run(&mut supervisor).await);
        assert!(coordinator.has_run());
        assert!(!coordinator.run(&mut supervisor).await);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_run_once() {
        let coordinator = inert_coordinator();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let mut supervisor = ProcessSupervisor::new();
                coordinator.run(&mut supervisor).await
            }));
        }

        let mut performed = 0;
        for task in tasks {
            if task.await.unwrap() {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);
    }

    #[tokio::test]
    async fn test_removes_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = dir.path().join("pipe");
        std::fs::write(&pipe, b"").unwrap();

        let coordinator = inert_coordinator().with_pipe(&pipe);
        let mut supervisor = ProcessSupervisor::new();
        coordinator.run(&mut supervisor).await;

        assert!(!pipe.exists());
    }

    #[tokio::test]
    async fn test_tolerates_missing_pipe() {
        let coordinator =
            inert_coordinator().with_pipe("/nonexistent-dir-for-adbcam-tests/pipe");
        let mut supervisor = ProcessSupervisor::new();
        assert!(coordinator.run(&mut supervisor).await);
    }

    #[tokio::test]
    async fn test_module_unload_failure_does_not_block_other_steps() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = dir.path().join("pipe");
        std::fs::write(&pipe, b"").unwrap();

        // The module id is nonsense, so the unload step fails whether or not
        // pactl is even installed; the pipe must still be removed.
        let coordinator = inert_coordinator()
            .with_audio_module("2147483647")
            .with_pipe(&pipe);
        let mut supervisor = ProcessSupervisor::new();

        assert!(coordinator.run(&mut supervisor).await);
        assert!(!pipe.exists());
    }

    #[tokio::test]
    async fn test_terminates_tracked_processes() {
        use crate::capture::CaptureCommand;

        let coordinator = inert_coordinator();
        let mut supervisor = ProcessSupervisor::new();
        supervisor
            .launch(
                "video",
                &CaptureCommand::external("sleep", vec!["30".to_string()]),
            )
            .unwrap();

        coordinator.run(&mut supervisor).await;
        assert!(supervisor.is_empty());
    }
}
