//! Pore extraction from separated particles
//!
//! Each particle becomes a sphere-equivalent pore:
//! - volume = voxel count · pitch³
//! - radius = (3V / 4π)^(1/3)
//! - area = exposed boundary voxels · surface factor · pitch²
//!
//! Particles are independent, so extraction runs in parallel and the result is sorted by id.

use super::config::GenerationConfig;
use crate::control::CancellationToken;
use crate::core_types::{
    cubic_meters_to_cubic_micrometers, meters_to_micrometers, square_meters_to_square_micrometers, LabelVolume,
    Particle, Pore, SeparatedVolume, Vec3,
};
use crate::error::Result;
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Convert every well-formed particle into a pore, ascending by id.
///
/// Particles with zero voxels or a bounding box outside the volume are skipped with a
/// warning. Repeated ids keep the first particle.
///
/// # Errors
/// `Cancelled` if the token fires during extraction.
pub fn extract_pores(
    separated: &SeparatedVolume,
    config: &GenerationConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Pore>> {
    let volume = &separated.volume;
    let extracted: Vec<Option<Pore>> = separated
        .particles
        .par_iter()
        .map(|particle| {
            cancel.check()?;
            Ok(extract_one(volume, particle, config))
        })
        .collect::<Result<_>>()?;

    let skipped = extracted.iter().filter(|p| p.is_none()).count();
    let mut pores: Vec<Pore> = extracted.into_iter().flatten().collect();
    pores.sort_by_key(|p| p.id);
    let before = pores.len();
    pores.dedup_by_key(|p| p.id);
    if pores.len() != before {
        warn!("Dropped {} particles with repeated ids", before - pores.len());
    }

    debug!("Extracted {} pores ({} particles skipped)", pores.len(), skipped);
    Ok(pores)
}

fn extract_one(volume: &LabelVolume, particle: &Particle, config: &GenerationConfig) -> Option<Pore> {
    if particle.voxel_count == 0 {
        warn!("Skipping particle {}: zero voxel count", particle.id);
        return None;
    }
    if !particle.bounds.fits(volume.dims()) {
        warn!(
            "Skipping particle {}: bounding box {:?}..{:?} outside volume {:?}",
            particle.id,
            particle.bounds.min,
            particle.bounds.max,
            volume.dims()
        );
        return None;
    }

    let pitch = config.pixel_size;
    let volume_m3 = particle.voxel_count as f64 * pitch.powi(3);
    let radius_m = (3.0 * volume_m3 / (4.0 * PI)).cbrt();
    let exposed = count_exposed_voxels(volume, particle);
    let area_m2 = exposed as f64 * config.surface_area_factor * pitch * pitch;

    let center = Vec3::new(
        particle.center[0] as f64,
        particle.center[1] as f64,
        particle.center[2] as f64,
    ) * meters_to_micrometers(pitch);

    Some(Pore::new(
        particle.id,
        cubic_meters_to_cubic_micrometers(volume_m3),
        square_meters_to_square_micrometers(area_m2),
        meters_to_micrometers(radius_m),
        center,
    ))
}

/// Voxels of the particle with at least one face-neighbour that is not the particle.
///
/// Neighbours outside the particle's bounding box count as exposed.
fn count_exposed_voxels(volume: &LabelVolume, particle: &Particle) -> u64 {
    const FACES: [[isize; 3]; 6] = [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1]];

    let bounds = &particle.bounds;
    let labels = volume.as_slice();
    let same = |p: [usize; 3], d: [isize; 3]| -> bool {
        let mut q = [0usize; 3];
        for axis in 0..3 {
            match p[axis].checked_add_signed(d[axis]) {
                Some(v) => q[axis] = v,
                None => return false,
            }
        }
        bounds.contains(q) && labels[volume.index(q[0], q[1], q[2])] == particle.id
    };

    let mut exposed = 0;
    for z in bounds.min[2]..=bounds.max[2] {
        for y in bounds.min[1]..=bounds.max[1] {
            for x in bounds.min[0]..=bounds.max[0] {
                if labels[volume.index(x, y, z)] != particle.id {
                    continue;
                }
                if FACES.iter().any(|&d| !same([x, y, z], d)) {
                    exposed += 1;
                }
            }
        }
    }
    exposed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::VoxelBounds;
    use approx::assert_relative_eq;

    fn cube_volume(side: usize, offset: usize, label: u32, dims: usize) -> LabelVolume {
        let mut volume = LabelVolume::empty([dims; 3]).unwrap();
        for z in offset..offset + side {
            for y in offset..offset + side {
                for x in offset..offset + side {
                    volume.set(x, y, z, label);
                }
            }
        }
        volume
    }

    #[test]
    fn test_cube_geometry() {
        let separated = SeparatedVolume::from_labels(cube_volume(3, 1, 4, 6));
        let config = GenerationConfig::with_pixel_size(2.0e-6);
        let pores = extract_pores(&separated, &config, &CancellationToken::new()).unwrap();
        assert_eq!(pores.len(), 1);

        let pore = &pores[0];
        assert_eq!(pore.id, 4);
        // 27 voxels of 8 µm³
        assert_relative_eq!(pore.volume, 216.0, epsilon = 1e-9);
        assert_relative_eq!(pore.radius, (3.0 * 216.0 / (4.0 * PI)).cbrt(), epsilon = 1e-9);
        // 26 of 27 voxels touch the surface; each counts 1.5 · 4 µm²
        assert_relative_eq!(pore.area, 26.0 * 1.5 * 4.0, epsilon = 1e-9);
        assert_relative_eq!(pore.center.x, 4.0, epsilon = 1e-9);
        assert_eq!(pore.connection_count, 0);
    }

    #[test]
    fn test_malformed_particles_are_skipped() {
        let volume = cube_volume(2, 0, 1, 4);
        let good = SeparatedVolume::from_labels(volume.clone()).particles;
        let mut particles = good.clone();
        particles.push(Particle {
            id: 7,
            voxel_count: 0,
            center: [0, 0, 0],
            bounds: VoxelBounds::point([0, 0, 0]),
        });
        particles.push(Particle {
            id: 8,
            voxel_count: 3,
            center: [0, 0, 0],
            bounds: VoxelBounds::point([9, 9, 9]),
        });
        let separated = SeparatedVolume::new(volume, particles);

        let pores = extract_pores(&separated, &GenerationConfig::default(), &CancellationToken::new()).unwrap();
        assert_eq!(pores.len(), 1);
        assert_eq!(pores[0].id, 1);
    }

    #[test]
    fn test_cancelled_extraction() {
        let separated = SeparatedVolume::from_labels(cube_volume(2, 0, 1, 4));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(extract_pores(&separated, &GenerationConfig::default(), &cancel).is_err());
    }
}
