//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Android microphone source fed to the audio capture process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MicSource {
    /// Standard microphone.
    Mic,
    /// Unprocessed (raw) microphone.
    MicUnprocessed,
    /// Microphone tuned for video recording.
    #[default]
    MicCamcorder,
    /// Microphone tuned for voice recognition.
    MicVoiceRecognition,
    /// Microphone tuned for voice calls.
    MicVoiceCommunication,
}

impl MicSource {
    /// The value passed to scrcpy's `--audio-source` flag.
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Mic => "mic",
            Self::MicUnprocessed => "mic-unprocessed",
            Self::MicCamcorder => "mic-camcorder",
            Self::MicVoiceRecognition => "mic-voice-recognition",
            Self::MicVoiceCommunication => "mic-voice-communication",
        }
    }
}

/// Video capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// v4l2loopback device path the camera feed is written to.
    pub device: PathBuf,
    /// Card label shown by video applications.
    pub card_label: String,
    /// Device number requested when loading v4l2loopback.
    pub video_nr: u32,
    /// Default frame rate when the camera listing offers no better choice.
    pub default_fps: u32,
    /// ADB transport port for the video process.
    pub port: u16,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            card_label: "AdbCam".to_string(),
            video_nr: 0,
            default_fps: 60,
            port: 27183,
        }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Name of the PulseAudio virtual source.
    pub source_name: String,
    /// Named pipe bridging the recorded audio into the virtual source.
    pub pipe_path: PathBuf,
    /// Microphone source on the device.
    pub source: MicSource,
    /// ADB transport port for the audio process.
    pub port: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source_name: "AdbCam".to_string(),
            pipe_path: PathBuf::from("/tmp/adbcam_pipe"),
            source: MicSource::default(),
            port: 27184,
        }
    }
}

/// Supervision loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Liveness poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Time a child gets to exit after SIGTERM before SIGKILL, in milliseconds.
    pub grace_period_ms: u64,
    /// Delay between launching video and audio, in milliseconds. Starting the
    /// two processes back to back makes them race for the ADB transport port.
    pub settle_delay_ms: u64,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            grace_period_ms: 2000,
            settle_delay_ms: 2000,
        }
    }
}

impl SupervisionConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub supervision: SupervisionConfig,
}
