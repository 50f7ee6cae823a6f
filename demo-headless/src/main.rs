use clap::Parser;
use pore_network_core::{
    CancellationToken, ComputeContext, ComputeOptions, FlowAxis, GenerationConfig, NetworkGenerator,
    PermeabilitySimulator, SimulationParams, SyntheticPacking,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Generate a pore network from a random sphere packing and compute its permeability
#[derive(Parser, Debug)]
#[command(name = "pnm-headless")]
#[command(about = "Headless pore network permeability run", long_about = None)]
struct Args {
    /// Grid size in voxels along each axis (cubic sample)
    #[arg(long, default_value_t = 48)]
    size: usize,

    /// Number of spheres in the packing
    #[arg(long, default_value_t = 120)]
    spheres: usize,

    /// Smallest sphere radius in voxels
    #[arg(long, default_value_t = 2.5)]
    min_radius: f64,

    /// Largest sphere radius in voxels
    #[arg(long, default_value_t = 5.0)]
    max_radius: f64,

    /// Seed for the packing
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Voxel pitch in metres
    #[arg(long, default_value_t = 1.0e-6)]
    pixel_size: f64,

    /// Maximum throat length as a multiple of the mean pore radius
    #[arg(long, default_value_t = 3.0)]
    max_throat_length_factor: f64,

    /// Maximum throats per pore
    #[arg(long, default_value_t = 6)]
    max_connections: usize,

    /// Skip bridging of disconnected inlet/outlet clusters
    #[arg(long)]
    no_flow_path: bool,

    /// Flow axis (x, y or z)
    #[arg(short, long, default_value = "z")]
    axis: FlowAxis,

    /// Dynamic viscosity in Pa·s
    #[arg(long, default_value_t = 0.001)]
    viscosity: f64,

    /// Inlet pressure in Pa
    #[arg(long, default_value_t = 2000.0)]
    input_pressure: f64,

    /// Outlet pressure in Pa
    #[arg(long, default_value_t = 1000.0)]
    output_pressure: f64,

    /// Solve on the CPU even when a GPU is available
    #[arg(long)]
    no_gpu: bool,

    /// Worker threads (default: cores - 1)
    #[arg(long)]
    threads: Option<usize>,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> pore_network_core::Result<()> {
    println!("=== Pore Network Permeability ===\n");

    let context = ComputeContext::init(ComputeOptions {
        enable_gpu: !args.no_gpu,
        worker_threads: args.threads,
    })?;

    let packing = SyntheticPacking {
        dims: [args.size; 3],
        sphere_count: args.spheres,
        min_radius: args.min_radius,
        max_radius: args.max_radius,
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let input = packing.generate(&mut rng)?;
    println!(
        "Packing: {} spheres in a {}³ grid (seed {})",
        input.particles.len(),
        args.size,
        args.seed
    );

    let config = GenerationConfig {
        max_throat_length_factor: args.max_throat_length_factor,
        max_connections: args.max_connections,
        enforce_flow_path: !args.no_flow_path,
        flow_path_axis: args.axis,
        ..GenerationConfig::with_pixel_size(args.pixel_size)
    };
    let cancel = CancellationToken::new();
    let report_progress = |percent: u8| info!("progress {percent}%");

    let model = NetworkGenerator::new(&context, config)?.generate(&input, &report_progress, &cancel)?;
    println!("\nNetwork:");
    println!("  Pores:             {}", model.pores().len());
    println!("  Throats:           {}", model.throats().len());
    println!("  Mean connectivity: {:.2}", model.mean_connectivity());
    println!("  Porosity:          {:.4}", model.porosity());
    println!("  Tortuosity:        {}", model.directional_tortuosity());

    let params = SimulationParams {
        viscosity: args.viscosity,
        input_pressure: args.input_pressure,
        output_pressure: args.output_pressure,
        use_gpu: !args.no_gpu,
        ..SimulationParams::along(args.axis)
    };
    let result = PermeabilitySimulator::new(&context).simulate(Arc::new(model), &params, &report_progress, &cancel)?;

    println!("\nSimulation ({} axis):", result.flow_axis);
    println!(
        "  Solver:            {:?}, {} iterations, residual {:.3e}{}",
        result.solve.backend,
        result.solve.iterations,
        result.solve.residual,
        if result.solve.converged { "" } else { " (not converged)" }
    );
    println!("  Inlet/outlet:      {} / {} pores", result.inlet_pore_ids.len(), result.outlet_pore_ids.len());
    println!("  Total flow rate:   {:.4e} m³/s", result.total_flow_rate);
    println!("  Sample length:     {:.4e} m", result.sample_length);
    println!("  Cross-section:     {:.4e} m²", result.cross_sectional_area);
    match result.permeability {
        Some(k) => println!("  Permeability:      {k}"),
        None => println!("  Permeability:      undefined ({})", result.validity),
    }

    context.shutdown();
    Ok(())
}
