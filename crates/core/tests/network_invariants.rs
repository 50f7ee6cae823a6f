//! Structural invariants, determinism, progress and cancellation of the pipeline
//!
//! Run tests with: cargo test --test network_invariants

mod common;

use pore_network_core::network::properties::max_tortuosity;
use pore_network_core::{
    CancellationToken, ComputeContext, GenerationConfig, NetworkGenerator, NoProgress, PermeabilitySimulator,
    PoreNetworkError, ProgressSink, SimulationParams, SyntheticPacking,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

const SEEDS: [u64; 3] = [7, 42, 2024];

#[test]
fn test_generated_networks_satisfy_invariants() {
    let context = ComputeContext::cpu_only().unwrap();
    let config = GenerationConfig::default();

    for seed in SEEDS {
        let model = common::synthetic_model(&context, seed);
        assert!(!model.pores().is_empty(), "seed {seed} produced no pores");

        let ids: Vec<u32> = model.pores().iter().map(|p| p.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "pores not in ascending id order");

        let mut degree = vec![0u32; model.pores().len()];
        for throat in model.throats() {
            assert!(throat.pore_id1 < throat.pore_id2);
            let a = model.index_of(throat.pore_id1).expect("dangling pore_id1");
            let b = model.index_of(throat.pore_id2).expect("dangling pore_id2");
            degree[a] += 1;
            degree[b] += 1;

            let r1 = model.pores()[a].radius;
            let r2 = model.pores()[b].radius;
            assert_eq!(throat.radius, config.throat_radius_factor * r1.min(r2));
            assert!(throat.length >= config.min_throat_length);
        }

        let total: u32 = model.pores().iter().map(|p| p.connection_count).sum();
        assert_eq!(total as usize, 2 * model.throats().len());
        for (pore, d) in model.pores().iter().zip(&degree) {
            assert_eq!(pore.connection_count, *d);
            assert!(pore.connection_count as usize <= config.max_connections);
        }

        let porosity = model.porosity();
        assert!((0.0..=1.0).contains(&porosity), "porosity {porosity} out of range");

        let ceiling = max_tortuosity(model.mean_connectivity());
        let tau = model.directional_tortuosity();
        for value in [tau.x, tau.y, tau.z, model.tortuosity()] {
            assert!(!value.is_nan());
            assert!(value == f64::INFINITY || (1.0..=ceiling).contains(&value), "tortuosity {value}");
        }
    }
}

#[test]
fn test_generation_is_deterministic() {
    let context = ComputeContext::cpu_only().unwrap();
    let first = common::synthetic_model(&context, 11);
    let second = common::synthetic_model(&context, 11);

    assert_eq!(first.pores(), second.pores());
    assert_eq!(first.throats(), second.throats());
    assert_eq!(first.porosity().to_bits(), second.porosity().to_bits());
    let (a, b) = (first.directional_tortuosity(), second.directional_tortuosity());
    assert_eq!(a.x.to_bits(), b.x.to_bits());
    assert_eq!(a.y.to_bits(), b.y.to_bits());
    assert_eq!(a.z.to_bits(), b.z.to_bits());
}

#[test]
fn test_determinism_across_pool_sizes() {
    let single = ComputeContext::init(pore_network_core::ComputeOptions {
        enable_gpu: false,
        worker_threads: Some(1),
    })
    .unwrap();
    let wide = ComputeContext::init(pore_network_core::ComputeOptions {
        enable_gpu: false,
        worker_threads: Some(4),
    })
    .unwrap();

    let a = common::synthetic_model(&single, 5);
    let b = common::synthetic_model(&wide, 5);
    assert_eq!(a.throats(), b.throats());
    assert_eq!(a.tortuosity().to_bits(), b.tortuosity().to_bits());
}

/// Records every percentage it receives.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<u8>>,
}

impl ProgressSink for Recorder {
    fn report(&self, percent: u8) {
        self.seen.lock().unwrap().push(percent);
    }
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let context = ComputeContext::cpu_only().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let volume = SyntheticPacking::default().generate(&mut rng).unwrap();

    let generation = Recorder::default();
    let model = NetworkGenerator::new(&context, GenerationConfig::default())
        .unwrap()
        .generate(&volume, &generation, &CancellationToken::new())
        .unwrap();
    assert_eq!(*generation.seen.lock().unwrap(), vec![0, 5, 30, 50, 70, 85, 100]);

    let simulation = Recorder::default();
    let params = SimulationParams {
        use_gpu: false,
        ..SimulationParams::default()
    };
    PermeabilitySimulator::new(&context)
        .simulate(Arc::new(model), &params, &simulation, &CancellationToken::new())
        .unwrap();
    let seen = simulation.seen.lock().unwrap();
    assert_eq!(*seen, vec![10, 20, 30, 40, 50, 70, 80, 90, 100]);
}

#[test]
fn test_cancelled_generation_returns_no_model() {
    let context = ComputeContext::cpu_only().unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    let volume = SyntheticPacking::default().generate(&mut rng).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = NetworkGenerator::new(&context, GenerationConfig::default())
        .unwrap()
        .generate(&volume, &NoProgress, &cancel);
    assert_eq!(result.unwrap_err(), PoreNetworkError::Cancelled);
}

#[test]
fn test_spawned_pipeline() {
    let context = Arc::new(ComputeContext::cpu_only().unwrap());
    let mut rng = StdRng::seed_from_u64(21);
    let volume = Arc::new(SyntheticPacking::default().generate(&mut rng).unwrap());

    let handle = NetworkGenerator::spawn(
        context.clone(),
        GenerationConfig::default(),
        volume,
        Arc::new(NoProgress),
        CancellationToken::new(),
    )
    .unwrap();
    let model = Arc::new(handle.join().unwrap().unwrap());

    let params = SimulationParams {
        use_gpu: false,
        ..SimulationParams::default()
    };
    let handle =
        PermeabilitySimulator::spawn(context, model.clone(), params, Arc::new(NoProgress), CancellationToken::new())
            .unwrap();
    let result = handle.join().unwrap().unwrap();
    assert!(Arc::ptr_eq(&result.model, &model));
    assert_eq!(result.pore_pressures.len(), model.pores().len());
    assert_eq!(result.throat_flow_rates.len(), model.throats().len());
}

#[test]
fn test_spawned_simulation_observes_cancellation() {
    let context = Arc::new(ComputeContext::cpu_only().unwrap());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let handle = PermeabilitySimulator::spawn(
        context,
        common::lattice_model(2, 2, 3),
        SimulationParams::default(),
        Arc::new(NoProgress),
        cancel,
    )
    .unwrap();
    assert_eq!(handle.join().unwrap().unwrap_err(), PoreNetworkError::Cancelled);
}
