//! AdbCam - use an Android device as a webcam and microphone on Linux.

pub mod adb;
pub mod capture;
pub mod config;
pub mod display;
pub mod session;
pub mod setup;
