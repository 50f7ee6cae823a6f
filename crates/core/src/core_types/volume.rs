//! Labeled voxel volume and separated particle records
//!
//! These types describe what the particle-separation step hands over: a dense 3D label
//! grid (0 = background) and one record per particle with voxel count, integer centroid
//! and an inclusive axis-aligned bounding box.

use crate::error::{PoreNetworkError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Label used for voxels that belong to no particle.
pub const BACKGROUND_LABEL: u32 = 0;

/// Dense 3D grid of particle labels, x-fastest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVolume {
    dims: [usize; 3],
    labels: Vec<u32>,
}

impl LabelVolume {
    /// Wrap a label buffer of `nx · ny · nz` entries.
    ///
    /// # Errors
    /// `InvalidVolume` if a dimension is zero, the product overflows, or the buffer length
    /// does not match.
    pub fn new(dims: [usize; 3], labels: Vec<u32>) -> Result<Self> {
        let len = voxel_count(dims)?;
        if labels.len() != len {
            return Err(PoreNetworkError::InvalidVolume(format!(
                "label buffer has {} entries, expected {}x{}x{} = {len}",
                labels.len(),
                dims[0],
                dims[1],
                dims[2]
            )));
        }
        Ok(Self { dims, labels })
    }

    /// Volume of the given size filled with background.
    ///
    /// # Errors
    /// `InvalidVolume` for zero or overflowing dimensions.
    pub fn empty(dims: [usize; 3]) -> Result<Self> {
        let len = voxel_count(dims)?;
        Ok(Self {
            dims,
            labels: vec![BACKGROUND_LABEL; len],
        })
    }

    /// Grid dimensions `[nx, ny, nz]`.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Flat index of voxel `(x, y, z)`. The caller guarantees the voxel is in range.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Whether `(x, y, z)` lies inside the grid.
    #[inline]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.dims[0] && y < self.dims[1] && z < self.dims[2]
    }

    /// Label at `(x, y, z)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<u32> {
        if self.contains(x, y, z) {
            Some(self.labels[self.index(x, y, z)])
        } else {
            None
        }
    }

    /// Overwrite the label at `(x, y, z)`. Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, label: u32) {
        if self.contains(x, y, z) {
            let idx = self.index(x, y, z);
            self.labels[idx] = label;
        }
    }

    /// Raw label buffer.
    pub fn as_slice(&self) -> &[u32] {
        &self.labels
    }
}

fn voxel_count(dims: [usize; 3]) -> Result<usize> {
    match dims[0].checked_mul(dims[1]).and_then(|v| v.checked_mul(dims[2])) {
        Some(len) if len > 0 => Ok(len),
        _ => Err(PoreNetworkError::InvalidVolume(format!(
            "volume dimensions {}x{}x{} are empty or overflow",
            dims[0], dims[1], dims[2]
        ))),
    }
}

/// Inclusive voxel bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelBounds {
    /// Lowest voxel coordinate on each axis
    pub min: [usize; 3],
    /// Highest voxel coordinate on each axis
    pub max: [usize; 3],
}

impl VoxelBounds {
    /// Box covering a single voxel.
    pub fn point(p: [usize; 3]) -> Self {
        Self { min: p, max: p }
    }

    /// Grow the box to include `p`.
    pub fn include(&mut self, p: [usize; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    /// Whether `min ≤ max` on every axis and `max` lies inside a grid of `dims`.
    pub fn fits(&self, dims: [usize; 3]) -> bool {
        (0..3).all(|a| self.min[a] <= self.max[a] && self.max[a] < dims[a])
    }

    /// Whether voxel `p` lies inside the box.
    #[inline]
    pub fn contains(&self, p: [usize; 3]) -> bool {
        (0..3).all(|a| self.min[a] <= p[a] && p[a] <= self.max[a])
    }
}

/// One separated particle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Particle {
    /// Label of the particle in the volume
    pub id: u32,
    /// Number of voxels carrying the label
    pub voxel_count: u64,
    /// Centroid in voxel coordinates
    pub center: [i64; 3],
    /// Inclusive voxel bounding box
    pub bounds: VoxelBounds,
}

/// Output of particle separation: the label grid and its particle list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatedVolume {
    /// Label grid
    pub volume: LabelVolume,
    /// Particles ordered by id
    pub particles: Vec<Particle>,
}

impl SeparatedVolume {
    /// Bundle an existing particle list with its volume.
    pub fn new(volume: LabelVolume, particles: Vec<Particle>) -> Self {
        Self { volume, particles }
    }

    /// Derive the particle list by scanning every non-background voxel.
    ///
    /// Centroids are rounded to the nearest voxel.
    pub fn from_labels(volume: LabelVolume) -> Self {
        struct Accum {
            count: u64,
            sum: [u64; 3],
            bounds: VoxelBounds,
        }

        let [nx, ny, nz] = volume.dims();
        let mut stats: FxHashMap<u32, Accum> = FxHashMap::default();
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let label = volume.labels[volume.index(x, y, z)];
                    if label == BACKGROUND_LABEL {
                        continue;
                    }
                    let p = [x, y, z];
                    let entry = stats.entry(label).or_insert_with(|| Accum {
                        count: 0,
                        sum: [0; 3],
                        bounds: VoxelBounds::point(p),
                    });
                    entry.count += 1;
                    for axis in 0..3 {
                        entry.sum[axis] += p[axis] as u64;
                    }
                    entry.bounds.include(p);
                }
            }
        }

        let mut particles: Vec<Particle> = stats
            .into_iter()
            .map(|(id, acc)| {
                let centroid = |axis: usize| (acc.sum[axis] as f64 / acc.count as f64).round() as i64;
                Particle {
                    id,
                    voxel_count: acc.count,
                    center: [centroid(0), centroid(1), centroid(2)],
                    bounds: acc.bounds,
                }
            })
            .collect();
        particles.sort_by_key(|p| p.id);

        Self { volume, particles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_rejects_bad_buffers() {
        assert!(LabelVolume::new([2, 2, 2], vec![0; 7]).is_err());
        assert!(LabelVolume::new([0, 2, 2], vec![]).is_err());
        assert!(LabelVolume::empty([usize::MAX, 2, 2]).is_err());
        assert!(LabelVolume::new([2, 2, 2], vec![0; 8]).is_ok());
    }

    #[test]
    fn test_indexing_is_x_fastest() {
        let mut volume = LabelVolume::empty([3, 4, 5]).unwrap();
        volume.set(2, 1, 3, 9);
        assert_eq!(volume.index(2, 1, 3), 2 + 3 * (1 + 4 * 3));
        assert_eq!(volume.get(2, 1, 3), Some(9));
        assert_eq!(volume.get(3, 0, 0), None);
    }

    #[test]
    fn test_from_labels_builds_particles() {
        let mut volume = LabelVolume::empty([4, 4, 4]).unwrap();
        for x in 0..2 {
            volume.set(x, 0, 0, 5);
        }
        volume.set(3, 3, 3, 2);

        let separated = SeparatedVolume::from_labels(volume);
        assert_eq!(separated.particles.len(), 2);

        let small = &separated.particles[0];
        assert_eq!(small.id, 2);
        assert_eq!(small.voxel_count, 1);
        assert_eq!(small.bounds, VoxelBounds::point([3, 3, 3]));

        let pair = &separated.particles[1];
        assert_eq!(pair.id, 5);
        assert_eq!(pair.voxel_count, 2);
        assert_eq!(pair.bounds.min, [0, 0, 0]);
        assert_eq!(pair.bounds.max, [1, 0, 0]);
        assert!(pair.bounds.fits([4, 4, 4]));
    }
}
