//! The supervision loop.
//!
//! Drives a run from launch through polling to shutdown. The loop itself is
//! single-tasked and proceeds by cooperative polling; the only concurrent
//! work is the stream monitors, which communicate back solely through the
//! disconnect signal.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::capture::{
    spawn_monitor, CaptureCommand, DisconnectSignal, LaunchError, ProcessSupervisor, StreamKind,
};
use crate::config::SupervisionConfig;
use crate::display;
use crate::session::{CleanupCoordinator, SessionState, SessionStateMachine};

/// How a supervised run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The device link was lost; the run shut down gracefully.
    Disconnected,
    /// Every capture process exited on its own.
    ProcessesExited,
    /// The operator interrupted the run.
    Interrupted,
    /// A capture process failed to launch.
    LaunchFailed(LaunchError),
}

impl RunOutcome {
    /// Launch failures are the only outcome reported as an overall failure;
    /// disconnects, voluntary exits and interrupts are graceful shutdowns.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::LaunchFailed(_))
    }
}

/// Top-level supervisor for one capture run.
pub struct SessionRunner {
    supervisor: ProcessSupervisor,
    signal: DisconnectSignal,
    cleanup: CleanupCoordinator,
    cancel: CancellationToken,
    state: SessionStateMachine,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl SessionRunner {
    #[must_use]
    pub fn new(config: &SupervisionConfig, cleanup: CleanupCoordinator) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(),
            signal: DisconnectSignal::new(),
            cleanup,
            cancel: CancellationToken::new(),
            state: SessionStateMachine::new(),
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Number of processes still tracked (zero after any completed run).
    #[must_use]
    pub fn tracked_processes(&self) -> usize {
        self.supervisor.len()
    }

    /// Run the full supervision lifecycle to completion.
    ///
    /// Launches the video process, waits out the settle delay, launches the
    /// audio process, then polls for disconnection, unexpected exits, or an
    /// operator interrupt. Cleanup runs on every path out, including launch
    /// failure.
    pub async fn run(&mut self, video: CaptureCommand, audio: CaptureCommand) -> RunOutcome {
        self.state.transition(SessionState::Launching);

        // One listener for the whole run. Recreating it per poll iteration
        // would drop a signal landing between registrations.
        let interrupt = shutdown_signal();
        tokio::pin!(interrupt);

        let outcome = match self.launch_phase(&video, &audio, &mut interrupt).await {
            Ok(Some(interrupted)) => interrupted,
            Ok(None) => self.running_phase(&mut interrupt).await,
            Err(e) => {
                display::print_error(&format!("Failed to start capture: {e}"));
                RunOutcome::LaunchFailed(e)
            }
        };

        self.shutdown().await;
        outcome
    }

    /// Launch both processes with their monitors.
    ///
    /// Returns `Ok(Some(Interrupted))` if the operator interrupts during the
    /// settle delay between the two launches.
    async fn launch_phase<F>(
        &mut self,
        video: &CaptureCommand,
        audio: &CaptureCommand,
        interrupt: &mut Pin<&mut F>,
    ) -> Result<Option<RunOutcome>, LaunchError>
    where
        F: Future<Output = ()>,
    {
        self.launch_monitored("video", video)?;

        tokio::select! {
            () = tokio::time::sleep(self.settle_delay) => {}
            () = interrupt.as_mut() => {
                display::print_status("Interrupted, shutting down...");
                return Ok(Some(RunOutcome::Interrupted));
            }
        }

        self.launch_monitored("audio", audio)?;
        Ok(None)
    }

    /// Launch one process and attach a monitor to each output stream.
    fn launch_monitored(&mut self, name: &str, command: &CaptureCommand) -> Result<(), LaunchError> {
        let streams = self.supervisor.launch(name, command)?;
        spawn_monitor(
            name,
            StreamKind::Stdout,
            streams.stdout,
            self.signal.clone(),
            self.cancel.child_token(),
        );
        spawn_monitor(
            name,
            StreamKind::Stderr,
            streams.stderr,
            self.signal.clone(),
            self.cancel.child_token(),
        );
        Ok(())
    }

    /// Poll for terminal conditions until one fires.
    async fn running_phase<F>(&mut self, interrupt: &mut Pin<&mut F>) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        self.state.transition(SessionState::Running);

        loop {
            tokio::select! {
                () = interrupt.as_mut() => {
                    display::print_status("Interrupted, shutting down...");
                    return RunOutcome::Interrupted;
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    if self.signal.is_set() {
                        display::print_status("Device disconnected, shutting down...");
                        return RunOutcome::Disconnected;
                    }

                    for exit in self.supervisor.poll_all() {
                        display::print_unexpected_exit(&exit.name, exit.code);
                    }

                    if self.supervisor.is_empty() {
                        display::print_status("All capture processes have exited");
                        return RunOutcome::ProcessesExited;
                    }
                }
            }
        }
    }

    /// Cancel the monitors and release everything, exactly once.
    async fn shutdown(&mut self) {
        self.state.transition(SessionState::ShuttingDown);
        self.cancel.cancel();
        self.cleanup.run(&mut self.supervisor).await;
        self.state.transition(SessionState::Done);
    }
}

/// Resolves when the operator requests shutdown: SIGINT (Ctrl-C), or SIGTERM
/// on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not install the SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SupervisionConfig {
        SupervisionConfig {
            poll_interval_ms: 50,
            grace_period_ms: 500,
            settle_delay_ms: 10,
        }
    }

    fn inert_cleanup() -> CleanupCoordinator {
        CleanupCoordinator::new(Duration::from_millis(500))
            .with_process_signature("adbcam-test-signature-matches-nothing")
    }

    #[test]
    fn test_runner_starts_in_init() {
        let runner = SessionRunner::new(&test_config(), inert_cleanup());
        assert_eq!(runner.state(), SessionState::Init);
        assert_eq!(runner.tracked_processes(), 0);
    }

    #[test]
    fn test_outcome_failure_mapping() {
        assert!(!RunOutcome::Disconnected.is_failure());
        assert!(!RunOutcome::ProcessesExited.is_failure());
        assert!(!RunOutcome::Interrupted.is_failure());
        assert!(RunOutcome::LaunchFailed(LaunchError::DuplicateName("video".to_string()))
            .is_failure());
    }
}
