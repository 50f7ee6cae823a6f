//! Synthetic packed-sphere label volumes
//!
//! Stand-in for the segmentation and particle-separation stages: spheres are stamped
//! into an empty grid in order, earlier spheres keeping contested voxels. All randomness
//! comes from the caller's generator, so a fixed seed reproduces the volume exactly.

use crate::core_types::{LabelVolume, SeparatedVolume, BACKGROUND_LABEL};
use crate::error::{require_positive, PoreNetworkError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Random sphere packing parameters (voxel units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticPacking {
    /// Grid dimensions `[nx, ny, nz]`
    pub dims: [usize; 3],
    /// Number of spheres to place
    pub sphere_count: usize,
    /// Smallest sphere radius in voxels
    pub min_radius: f64,
    /// Largest sphere radius in voxels
    pub max_radius: f64,
}

impl Default for SyntheticPacking {
    fn default() -> Self {
        Self {
            dims: [48, 48, 48],
            sphere_count: 120,
            min_radius: 2.5,
            max_radius: 5.0,
        }
    }
}

impl SyntheticPacking {
    /// Draw sphere centers and radii from `rng` and label them `1..=sphere_count`.
    ///
    /// # Errors
    /// `InvalidParameter` for a non-positive or inverted radius range, `InvalidVolume` for
    /// empty dimensions.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Result<SeparatedVolume> {
        require_positive("min_radius", self.min_radius)?;
        require_positive("max_radius", self.max_radius)?;
        if self.max_radius < self.min_radius {
            return Err(PoreNetworkError::invalid_parameter(
                "max_radius",
                format!("must be at least min_radius ({})", self.min_radius),
            ));
        }

        if self.dims.contains(&0) {
            return Err(PoreNetworkError::InvalidVolume(format!("empty dimensions {:?}", self.dims)));
        }

        let spheres: Vec<([f64; 3], f64)> = (0..self.sphere_count)
            .map(|_| {
                let center = [
                    rng.random_range(0.0..self.dims[0] as f64),
                    rng.random_range(0.0..self.dims[1] as f64),
                    rng.random_range(0.0..self.dims[2] as f64),
                ];
                (center, rng.random_range(self.min_radius..=self.max_radius))
            })
            .collect();
        place_spheres(self.dims, &spheres)
    }
}

/// Stamp `(center, radius)` spheres (voxel units) with labels `1, 2, ...` in order.
///
/// Spheres that end up with no voxels produce no particle.
///
/// # Errors
/// `InvalidVolume` for empty or overflowing dimensions.
pub fn place_spheres(dims: [usize; 3], spheres: &[([f64; 3], f64)]) -> Result<SeparatedVolume> {
    let mut volume = LabelVolume::empty(dims)?;
    for (label, &(center, radius)) in (1u32..).zip(spheres) {
        let lo = |axis: usize| (center[axis] - radius).floor().max(0.0) as usize;
        let hi = |axis: usize| ((center[axis] + radius).ceil().max(0.0) as usize).min(dims[axis] - 1);
        let r2 = radius * radius;
        for z in lo(2)..=hi(2) {
            for y in lo(1)..=hi(1) {
                for x in lo(0)..=hi(0) {
                    let d2 = (x as f64 - center[0]).powi(2)
                        + (y as f64 - center[1]).powi(2)
                        + (z as f64 - center[2]).powi(2);
                    if d2 <= r2 && volume.get(x, y, z) == Some(BACKGROUND_LABEL) {
                        volume.set(x, y, z, label);
                    }
                }
            }
        }
    }
    Ok(SeparatedVolume::from_labels(volume))
}
