//! Capture process lifecycle: spawning, tracking, and output monitoring.

mod monitor;
mod process;
mod supervisor;

pub use monitor::*;
pub use process::*;
pub use supervisor::*;
