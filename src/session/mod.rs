//! Supervised run lifecycle: state machine, cleanup, and the main loop.

mod cleanup;
mod runner;
mod state;

pub use cleanup::*;
pub use runner::*;
pub use state::*;
