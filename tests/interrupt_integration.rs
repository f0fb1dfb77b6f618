//! Operator-interrupt handling, isolated in its own test binary: the raised
//! signal is delivered process-wide and must not reach the listeners the
//! other integration tests install.

#![cfg(unix)]

use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use adbcam::capture::CaptureCommand;
use adbcam::config::SupervisionConfig;
use adbcam::session::{CleanupCoordinator, RunOutcome, SessionRunner, SessionState};

fn test_config() -> SupervisionConfig {
    SupervisionConfig {
        poll_interval_ms: 50,
        grace_period_ms: 2000,
        settle_delay_ms: 10,
    }
}

fn sh(script: &str) -> CaptureCommand {
    CaptureCommand::external("sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn sigterm_while_running_shuts_down_gracefully() {
    let cleanup = CleanupCoordinator::new(test_config().grace_period())
        .with_process_signature("adbcam-test-signature-matches-nothing");
    let mut runner = SessionRunner::new(&test_config(), cleanup.clone());

    let started = Instant::now();
    let outcome = {
        let run = runner.run(sh("exec sleep 30"), sh("exec sleep 30"));
        tokio::pin!(run);

        // Let the runner install its signal listeners and reach the polling
        // loop before raising the signal.
        let early = tokio::select! {
            outcome = run.as_mut() => Some(outcome),
            () = tokio::time::sleep(Duration::from_millis(400)) => None,
        };
        assert!(early.is_none(), "run ended before the signal was raised: {early:?}");

        kill(Pid::this(), Signal::SIGTERM).unwrap();
        run.await
    };

    assert!(matches!(outcome, RunOutcome::Interrupted));
    assert!(!outcome.is_failure());
    assert_eq!(runner.state(), SessionState::Done);
    assert_eq!(runner.tracked_processes(), 0);
    assert!(cleanup.has_run());
    // Both children honor SIGTERM, so shutdown must finish well inside the
    // grace period rather than waiting out a force-kill.
    assert!(started.elapsed() < Duration::from_secs(5));
}
