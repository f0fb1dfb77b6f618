//! ADB collaborators: device discovery and camera capability listing.

mod cameras;
mod devices;

pub use cameras::*;
pub use devices::*;
