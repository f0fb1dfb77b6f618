//! Integration tests driving the supervision loop with real child processes.

use std::time::Duration;

use adbcam::capture::CaptureCommand;
use adbcam::config::SupervisionConfig;
use adbcam::session::{CleanupCoordinator, RunOutcome, SessionRunner, SessionState};

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

fn sh(script: &str) -> CaptureCommand {
    CaptureCommand::external("sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn disconnect_on_stderr_shuts_down_both_processes() {
    let dir = tempfile::tempdir().unwrap();
    let pipe = dir.path().join("pipe");
    std::fs::write(&pipe, b"").unwrap();

    let cleanup = inert_cleanup().with_pipe(&pipe);
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    // The video process reports a disconnect and then hangs; the audio
    // process just hangs. Shutdown must not wait for either.
    let video = sh("echo 'WARN: Device disconnected' 1>&2; sleep 30");
    let audio = sh("sleep 30");

    let outcome = runner.run(video, audio).await;

    assert!(matches!(outcome, RunOutcome::Disconnected));
    assert!(!outcome.is_failure());
    assert_eq!(runner.state(), SessionState::Done);
    assert_eq!(runner.tracked_processes(), 0);
    assert!(cleanup.has_run());
    // The pipe is released even though the audio process never exited on its
    // own.
    assert!(!pipe.exists());
}

#[tokio::test]
async fn no_device_marker_counts_as_disconnect() {
    let mut runner = SessionRunner::new(&test_config(), inert_cleanup());

    let video = sh("echo 'ERROR: Could not find any ADB device' 1>&2; sleep 30");
    let audio = sh("sleep 30");

    let outcome = runner.run(video, audio).await;
    assert!(matches!(outcome, RunOutcome::Disconnected));
    assert_eq!(runner.tracked_processes(), 0);
}

#[tokio::test]
async fn voluntary_exits_drain_registry_and_shut_down() {
    let cleanup = inert_cleanup();
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    let outcome = runner.run(sh("exit 3"), sh("exit 4")).await;

    assert!(matches!(outcome, RunOutcome::ProcessesExited));
    assert!(!outcome.is_failure());
    assert_eq!(runner.state(), SessionState::Done);
    assert!(cleanup.has_run());
}

#[tokio::test]
async fn audio_launch_failure_terminates_running_video() {
    let cleanup = inert_cleanup();
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    let video = sh("sleep 30");
    let audio = CaptureCommand::external("adbcam-test-no-such-binary", vec![]);

    let outcome = runner.run(video, audio).await;

    assert!(matches!(outcome, RunOutcome::LaunchFailed(_)));
    assert!(outcome.is_failure());
    assert_eq!(runner.state(), SessionState::Done);
    // Cleanup still terminated the already-running video process.
    assert_eq!(runner.tracked_processes(), 0);
    assert!(cleanup.has_run());
}

#[tokio::test]
async fn video_launch_failure_fails_fast() {
    let cleanup = inert_cleanup();
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    let video = CaptureCommand::external("adbcam-test-no-such-binary", vec![]);
    let audio = sh("sleep 30");

    let outcome = runner.run(video, audio).await;

    assert!(matches!(outcome, RunOutcome::LaunchFailed(_)));
    assert_eq!(runner.state(), SessionState::Done);
    assert_eq!(runner.tracked_processes(), 0);
}

#[tokio::test]
async fn cleanup_runs_only_once_across_a_run() {
    let cleanup = inert_cleanup();
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    let outcome = runner.run(sh("exit 0"), sh("exit 0")).await;
    assert!(matches!(outcome, RunOutcome::ProcessesExited));

    // A later invocation from any other trigger is a no-op.
    let mut idle = adbcam::capture::ProcessSupervisor::new();
    assert!(!cleanup.run(&mut idle).await);
}
