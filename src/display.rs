//! Colored CLI output for operator-facing diagnostics.
//!
//! Monitor output, setup progress, and shutdown notices go through here so
//! the terminal stays consistent with the tracing timestamp format.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Bracketed uppercase tag for a logical process name.
fn tag(process: &str) -> String {
    format!("[{}]", process.to_uppercase())
}

/// Print a setup or progress line.
pub fn print_status(message: &str) {
    println!("{} {} {message}", timestamp().dimmed(), "[*]".blue().bold());
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!(
        "{} {} {message}",
        timestamp().dimmed(),
        "[ERROR]".red().bold()
    );
    let _ = io::stdout().flush();
}

/// Print a warning surfaced from a capture process stream.
pub fn print_stream_warning(process: &str, stream: &str, line: &str) {
    println!(
        "{} {} {} {line}",
        timestamp().dimmed(),
        tag(process).yellow().bold(),
        format!("({stream})").dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an error surfaced from a capture process stream.
pub fn print_stream_error(process: &str, stream: &str, line: &str) {
    println!(
        "{} {} {} {line}",
        timestamp().dimmed(),
        tag(process).red().bold(),
        format!("({stream})").dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a device disconnection notice.
pub fn print_disconnect(process: &str, line: &str) {
    println!(
        "{} {} {} {}",
        timestamp().dimmed(),
        tag(process).red().bold(),
        "device disconnected:".red(),
        line.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an unexpected process exit.
pub fn print_unexpected_exit(process: &str, code: Option<i32>) {
    let code_str = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
    println!(
        "{} {} exited unexpectedly {}",
        timestamp().dimmed(),
        tag(process).red().bold(),
        format!("(exit code: {code_str})").dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the banner shown once both capture processes are up.
pub fn print_ready(video_device: &Path, card_label: &str, mic_source: &str) {
    let rule = "=".repeat(60);
    println!("{}", rule.dimmed());
    println!("{} Setup complete", "[*]".green().bold());
    println!(
        "    Camera available at {} (select {} in video apps)",
        video_device.display().cyan(),
        card_label.cyan()
    );
    println!(
        "    Microphone available as {} (select it as input)",
        mic_source.cyan()
    );
    println!("    Press Ctrl+C to stop and clean up");
    println!("{}", rule.dimmed());
    let _ = io::stdout().flush();
}
