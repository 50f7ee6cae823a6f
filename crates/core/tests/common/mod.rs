//! Shared helpers for the integration suites

#![allow(dead_code)]

use pore_network_core::{
    CancellationToken, ComputeContext, GenerationConfig, NetworkGenerator, NoProgress, Pore, PoreNetworkModel,
    SyntheticPacking, Throat, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Network generated from a seeded synthetic packing.
pub fn synthetic_model(context: &ComputeContext, seed: u64) -> PoreNetworkModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let volume = SyntheticPacking::default().generate(&mut rng).unwrap();
    NetworkGenerator::new(context, GenerationConfig::default())
        .unwrap()
        .generate(&volume, &NoProgress, &CancellationToken::new())
        .unwrap()
}

/// `nx × ny × nz` lattice of pores 10 µm apart with nearest-neighbour throats.
///
/// Pore radii vary deterministically so the pressure field is not trivially linear.
pub fn lattice_model(nx: u32, ny: u32, nz: u32) -> Arc<PoreNetworkModel> {
    let id = |x: u32, y: u32, z: u32| 1 + x + nx * (y + ny * z);
    let mut pores = Vec::new();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let radius = 3.0 + f64::from((x * 7 + y * 3 + z * 5) % 4) * 0.5;
                let center = Vec3::new(f64::from(x) * 10.0, f64::from(y) * 10.0, f64::from(z) * 10.0);
                pores.push(Pore::sphere(id(x, y, z), radius, center));
            }
        }
    }

    let mut throats = Vec::new();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let a = &pores[(id(x, y, z) - 1) as usize];
                let mut link = |b: u32| {
                    let b = &pores[(b - 1) as usize];
                    let next = throats.len() as u32;
                    throats.push(Throat::between(next, a, b, 0.4, 0.1).unwrap());
                };
                if x + 1 < nx {
                    link(id(x + 1, y, z));
                }
                if y + 1 < ny {
                    link(id(x, y + 1, z));
                }
                if z + 1 < nz {
                    link(id(x, y, z + 1));
                }
            }
        }
    }
    Arc::new(PoreNetworkModel::new(pores, throats, 1e-6).unwrap())
}
