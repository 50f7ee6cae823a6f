//! Core types and utilities

pub mod axis;
pub mod pore;
pub mod units;
pub mod vec3;
pub mod volume;

// Re-export
pub use axis::FlowAxis;
pub use pore::{Pore, Throat};
pub use units::*;
pub use vec3::Vec3;
pub use volume::{LabelVolume, Particle, SeparatedVolume, VoxelBounds, BACKGROUND_LABEL};
