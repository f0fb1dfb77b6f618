//! ADB device discovery.
//!
//! A capture run needs at least one device in the `device` state before
//! anything on the host is touched.

use std::time::Duration;

use tokio::process::Command;

/// How long to wait for `adb devices` before giving up.
const ADB_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for ADB queries.
#[derive(thiserror::Error, Debug)]
pub enum AdbError {
    /// The adb binary was not found on PATH.
    #[error("adb not found; install Android Debug Bridge")]
    NotFound,
    /// adb did not answer within the timeout.
    #[error("Timed out waiting for adb")]
    Timeout,
    /// adb ran but reported a failure.
    #[error("adb failed: {stderr}")]
    CommandFailed { stderr: String },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdbError {
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Io(err),
        }
    }
}

/// List serials of connected devices in the `device` state.
///
/// Unauthorized and offline entries are filtered out; they cannot serve a
/// capture session.
///
/// # Errors
///
/// Returns `AdbError` if adb is missing, times out, or exits with an error.
pub async fn list_devices() -> Result<Vec<String>, AdbError> {
    let output = tokio::time::timeout(ADB_TIMEOUT, Command::new("adb").arg("devices").output())
        .await
        .map_err(|_| AdbError::Timeout)?
        .map_err(AdbError::from_io)?;

    if !output.status.success() {
        return Err(AdbError::CommandFailed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let devices = parse_device_listing(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!(count = devices.len(), "ADB device scan complete");
    Ok(devices)
}

/// Parse `adb devices` output into serials in the `device` state.
///
/// The first line is the `List of devices attached` header; daemon startup
/// noise begins with `*`.
#[must_use]
pub fn parse_device_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('*') {
                return None;
            }
            let mut parts = line.split('\t');
            let serial = parts.next()?;
            (parts.next()? == "device").then(|| serial.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_device() {
        let output = "List of devices attached\nemulator-5554\tdevice\n";
        assert_eq!(parse_device_listing(output), vec!["emulator-5554"]);
    }

    #[test]
    fn test_parse_skips_unauthorized_and_offline() {
        let output = "List of devices attached\n\
                      R58M123ABC\tdevice\n\
                      emulator-5556\tunauthorized\n\
                      192.168.1.20:5555\toffline\n";
        assert_eq!(parse_device_listing(output), vec!["R58M123ABC"]);
    }

    #[test]
    fn test_parse_skips_daemon_noise() {
        let output = "List of devices attached\n\
                      * daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      R58M123ABC\tdevice\n";
        assert_eq!(parse_device_listing(output), vec!["R58M123ABC"]);
    }

    #[test]
    fn test_parse_empty_listing() {
        let output = "List of devices attached\n\n";
        assert!(parse_device_listing(output).is_empty());
    }
}
