//! Concurrent monitoring of capture process output.
//!
//! One monitor task runs per (process, stream) pair, classifying each line
//! and publishing disconnection through a shared set-once signal. Monitors
//! are bound to the run through a cancellation token rather than abandoned
//! at shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adb::NO_DEVICE_MARKER;
use crate::display;

/// Warning tag scrcpy prefixes recoverable diagnostics with.
const WARN_MARKER: &str = "WARN:";

/// Marker for a lost physical device link.
const DEVICE_DISCONNECTED_MARKER: &str = "Device disconnected";

/// Markers worth surfacing to the operator as errors.
const FATAL_MARKERS: [&str; 5] = ["ERROR:", "FATAL:", "Failed", "Error", "Cannot"];

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Classification of a single output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCategory {
    /// The device link was lost or no device is reachable.
    Disconnect,
    /// An error worth surfacing to the operator.
    FatalError,
    /// A warning worth surfacing to the operator.
    Warning,
    /// Everything else; not surfaced by default.
    Info,
}

/// One classified output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// Logical name of the producing process.
    pub process: String,
    pub stream: StreamKind,
    pub category: LineCategory,
    pub text: String,
}

/// Classify a single non-empty line.
///
/// Disconnection outranks everything: a disconnected-device warning or a
/// no-device error is terminal for the run, not a diagnostic to scroll past.
#[must_use]
pub fn classify(line: &str) -> LineCategory {
    let disconnected =
        line.contains(DEVICE_DISCONNECTED_MARKER) && line.contains(WARN_MARKER);
    if disconnected || line.contains(NO_DEVICE_MARKER) {
        LineCategory::Disconnect
    } else if FATAL_MARKERS.iter().any(|marker| line.contains(marker)) {
        LineCategory::FatalError
    } else if line.contains(WARN_MARKER) {
        LineCategory::Warning
    } else {
        LineCategory::Info
    }
}

/// Shared set-once disconnection flag.
///
/// `set` is idempotent and safe from any number of concurrent monitors; the
/// flag never resets for the lifetime of a run.
#[derive(Debug, Clone, Default)]
pub struct DisconnectSignal {
    flag: Arc<AtomicBool>,
}

impl DisconnectSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Disconnect signal set");
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Read a stream as a lazy sequence of classified lines.
///
/// Empty lines are skipped. The stream ends at end-of-file, after the first
/// `Disconnect` classification, or on a read error; a read error is local to
/// this stream and is logged rather than propagated.
pub fn classified_lines<R>(
    process: impl Into<String>,
    stream: StreamKind,
    reader: R,
) -> impl Stream<Item = ClassifiedLine>
where
    R: AsyncRead + Unpin,
{
    let process = process.into();
    let lines = BufReader::new(reader).lines();

    futures_util::stream::unfold(
        (lines, process, false),
        move |(mut lines, process, done)| async move {
            if done {
                return None;
            }
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        let category = classify(text);
                        let classified = ClassifiedLine {
                            process: process.clone(),
                            stream,
                            category,
                            text: text.to_string(),
                        };
                        let done = category == LineCategory::Disconnect;
                        return Some((classified, (lines, process, done)));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        tracing::warn!(
                            process = %process,
                            stream = stream.as_str(),
                            error = %e,
                            "Stream read failed, monitor stopping"
                        );
                        return None;
                    }
                }
            }
        },
    )
}

/// Spawn one monitor task for a (process, stream) pair.
///
/// The task surfaces errors and warnings, sets `signal` on disconnection, and
/// exits on end-of-stream, disconnection, or cancellation.
pub fn spawn_monitor<R>(
    process: impl Into<String>,
    kind: StreamKind,
    reader: R,
    signal: DisconnectSignal,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let process = process.into();
    tokio::spawn(async move {
        let lines = classified_lines(process, kind, reader);
        tokio::pin!(lines);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                line = lines.next() => {
                    let Some(line) = line else { break };
                    match line.category {
                        LineCategory::Disconnect => {
                            display::print_disconnect(&line.process, &line.text);
                            signal.set();
                            break;
                        }
                        LineCategory::FatalError => {
                            display::print_stream_error(
                                &line.process,
                                line.stream.as_str(),
                                &line.text,
                            );
                        }
                        LineCategory::Warning => {
                            display::print_stream_warning(
                                &line.process,
                                line.stream.as_str(),
                                &line.text,
                            );
                        }
                        LineCategory::Info => {
                            tracing::debug!(
                                process = %line.process,
                                stream = line.stream.as_str(),
                                text = %line.text,
                            );
                        }
                    }
                }
            }
        }
    })
}
