use pore_network_core::core_types::VoxelBounds;
use pore_network_core::{
    CancellationToken, ComputeContext, FlowAxis, GenerationConfig, LabelVolume, NetworkGenerator, NoProgress,
    Particle, Pore, PoreNetworkModel, SeparatedVolume, Throat,
};
use std::ptr;
use std::sync::Arc;

use crate::error::{DefaultPnmError, PnmErrorCode};
use crate::helpers::{guard_panic, slice_from_raw, track_error, track_result, write_array, write_out};

/// Flow axis selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnmFlowAxis {
    /// Along x.
    X = 0,
    /// Along y.
    Y = 1,
    /// Along z.
    Z = 2,
}

impl From<PnmFlowAxis> for FlowAxis {
    fn from(axis: PnmFlowAxis) -> Self {
        match axis {
            PnmFlowAxis::X => FlowAxis::X,
            PnmFlowAxis::Y => FlowAxis::Y,
            PnmFlowAxis::Z => FlowAxis::Z,
        }
    }
}

impl From<FlowAxis> for PnmFlowAxis {
    fn from(axis: FlowAxis) -> Self {
        match axis {
            FlowAxis::X => PnmFlowAxis::X,
            FlowAxis::Y => PnmFlowAxis::Y,
            FlowAxis::Z => PnmFlowAxis::Z,
        }
    }
}

/// One separated particle as produced by the host's particle-separation step.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PnmParticle {
    /// Particle label in the volume (non-zero).
    pub id: u32,
    /// Number of voxels carrying the label.
    pub voxel_count: u64,
    /// Centroid in voxel coordinates.
    pub center: [i64; 3],
    /// Inclusive lower voxel corner.
    pub bounds_min: [usize; 3],
    /// Inclusive upper voxel corner.
    pub bounds_max: [usize; 3],
}

impl From<&PnmParticle> for Particle {
    fn from(p: &PnmParticle) -> Self {
        Particle {
            id: p.id,
            voxel_count: p.voxel_count,
            center: p.center,
            bounds: VoxelBounds {
                min: p.bounds_min,
                max: p.bounds_max,
            },
        }
    }
}

/// Network generation parameters. Obtain defaults from `pnm_generation_config_default`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PnmGenerationConfig {
    /// Voxel pitch in metres per voxel.
    pub pixel_size: f64,
    /// Maximum throat length as a multiple of the mean pore radius.
    pub max_throat_length_factor: f64,
    /// Minimum radius overlap for two pores to connect.
    pub min_overlap_factor: f64,
    /// Degree cap per pore.
    pub max_connections: usize,
    /// Throat radius as a fraction of the smaller pore radius.
    pub throat_radius_factor: f64,
    /// Lower bound on throat length in µm.
    pub min_throat_length: f64,
    /// Bridge disconnected clusters between inlet and outlet.
    pub enforce_flow_path: bool,
    /// Axis whose boundary zones must be connected.
    pub flow_path_axis: PnmFlowAxis,
}

impl From<&PnmGenerationConfig> for GenerationConfig {
    fn from(c: &PnmGenerationConfig) -> Self {
        GenerationConfig {
            pixel_size: c.pixel_size,
            max_throat_length_factor: c.max_throat_length_factor,
            min_overlap_factor: c.min_overlap_factor,
            max_connections: c.max_connections,
            throat_radius_factor: c.throat_radius_factor,
            min_throat_length: c.min_throat_length,
            enforce_flow_path: c.enforce_flow_path,
            flow_path_axis: c.flow_path_axis.into(),
            ..GenerationConfig::default()
        }
    }
}

/// Default generation parameters (1 µm voxels).
#[no_mangle]
pub extern "C" fn pnm_generation_config_default() -> PnmGenerationConfig {
    let c = GenerationConfig::default();
    PnmGenerationConfig {
        pixel_size: c.pixel_size,
        max_throat_length_factor: c.max_throat_length_factor,
        min_overlap_factor: c.min_overlap_factor,
        max_connections: c.max_connections,
        throat_radius_factor: c.throat_radius_factor,
        min_throat_length: c.min_throat_length,
        enforce_flow_path: c.enforce_flow_path,
        flow_path_axis: c.flow_path_axis.into(),
    }
}

/// FFI-friendly pore record. Geometry in µm.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnmPore {
    /// Pore id (particle label).
    pub id: u32,
    /// Volume (µm³).
    pub volume: f64,
    /// Surface area (µm²).
    pub area: f64,
    /// Sphere-equivalent radius (µm).
    pub radius: f64,
    /// Centroid (µm).
    pub center: [f64; 3],
    /// Number of incident throats.
    pub connection_count: u32,
}

impl From<&Pore> for PnmPore {
    fn from(p: &Pore) -> Self {
        Self {
            id: p.id,
            volume: p.volume,
            area: p.area,
            radius: p.radius,
            center: [p.center.x, p.center.y, p.center.z],
            connection_count: p.connection_count,
        }
    }
}

/// FFI-friendly throat record. Geometry in µm.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnmThroat {
    /// Throat id.
    pub id: u32,
    /// Smaller pore id.
    pub pore_id1: u32,
    /// Larger pore id.
    pub pore_id2: u32,
    /// Radius (µm).
    pub radius: f64,
    /// Length (µm).
    pub length: f64,
    /// Volume (µm³).
    pub volume: f64,
}

impl From<&Throat> for PnmThroat {
    fn from(t: &Throat) -> Self {
        Self {
            id: t.id,
            pore_id1: t.pore_id1,
            pore_id2: t.pore_id2,
            radius: t.radius,
            length: t.length,
            volume: t.volume,
        }
    }
}

/// Tortuosity per axis and overall. `+∞` where no inlet-outlet path exists.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnmTortuosity {
    /// Along x.
    pub x: f64,
    /// Along y.
    pub y: f64,
    /// Along z.
    pub z: f64,
    /// Mean of the finite axes.
    pub overall: f64,
}

/// A generated pore network.
///
/// Immutable after creation, so every query is safe from any thread.
pub struct PnmNetwork {
    pub(crate) model: Arc<PoreNetworkModel>,
    pores: Vec<PnmPore>,
    throats: Vec<PnmThroat>,
}

impl PnmNetwork {
    pub(crate) fn new(model: PoreNetworkModel) -> Box<Self> {
        let pores = model.pores().iter().map(PnmPore::from).collect();
        let throats = model.throats().iter().map(PnmThroat::from).collect();
        Box::new(Self {
            model: Arc::new(model),
            pores,
            throats,
        })
    }
}

/// Borrow a network handle, rejecting null.
pub(crate) fn network_from_ptr<'a>(ptr: *const PnmNetwork) -> Result<&'a PnmNetwork, DefaultPnmError> {
    // SAFETY: non-null pointers come from `pnm_network_create` per the API contract.
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultPnmError::null_pointer("network"))
}

/// Generate a pore network from a label volume and return it via out-parameter.
///
/// Parameters
/// - `labels`: `nx · ny · nz` labels, x fastest, 0 = background. Copied.
/// - `particles`/`particle_count`: separated particle list. Pass null and 0 to derive it
///   from the labels.
/// - `config`: generation parameters, or null for defaults.
/// - `out_network`: receives the network, null on failure.
///
/// Returns
/// - `PnmErrorCode::Ok` on success
/// - `NullPointer`, `InvalidParameter`, `InvalidVolume`, `WorkerPool` or `Panic` on failure;
///   call `pnm_get_last_error()` for details
///
/// # Safety
///
/// - `labels` must point to `nx · ny · nz` readable `u32` values.
/// - `particles` must point to `particle_count` readable records or be null with a zero count.
/// - `config` must be null or point to a valid `PnmGenerationConfig`.
/// - `out_network` must be a valid, non-null pointer to writable memory. The caller owns the
///   result and MUST call `pnm_network_destroy` exactly once.
///
/// Example (C++)
/// ```cpp
/// PnmGenerationConfig config = pnm_generation_config_default();
/// config.pixel_size = 2.5e-6;
/// PnmNetwork* network = nullptr;
/// if (pnm_network_create(labels, nx, ny, nz, nullptr, 0, &config, &network) != PnmErrorCode::Ok) {
///     fprintf(stderr, "%s\n", pnm_get_last_error());
///     return;
/// }
/// // ... query or simulate ...
/// pnm_network_destroy(network);
/// ```
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn pnm_network_create(
    labels: *const u32,
    nx: usize,
    ny: usize,
    nz: usize,
    particles: *const PnmParticle,
    particle_count: usize,
    config: *const PnmGenerationConfig,
    out_network: *mut *mut PnmNetwork,
) -> PnmErrorCode {
    if out_network.is_null() {
        return track_error(&DefaultPnmError::null_pointer("out_network"));
    }

    let result = guard_panic("network generation", || {
        let len = nx
            .checked_mul(ny)
            .and_then(|v| v.checked_mul(nz))
            .filter(|&len| len > 0)
            .ok_or_else(|| DefaultPnmError::invalid_parameter("nx/ny/nz", "volume is empty or overflows"))?;
        // SAFETY: caller contract on `labels` and `particles`.
        let labels = unsafe { slice_from_raw(labels, len, "labels") }?;
        let particles = unsafe { slice_from_raw(particles, particle_count, "particles") }?;
        if labels.is_empty() {
            return Err(DefaultPnmError::null_pointer("labels"));
        }
        // SAFETY: caller contract on `config`.
        let config = unsafe { config.as_ref() }.map_or_else(GenerationConfig::default, GenerationConfig::from);

        let volume = LabelVolume::new([nx, ny, nz], labels.to_vec())?;
        let input = if particles.is_empty() {
            SeparatedVolume::from_labels(volume)
        } else {
            SeparatedVolume::new(volume, particles.iter().map(Particle::from).collect())
        };

        let context = ComputeContext::shared()?;
        let model = NetworkGenerator::new(context, config)?.generate(&input, &NoProgress, &CancellationToken::new())?;
        Ok(PnmNetwork::new(model))
    });

    match track_result(result) {
        Ok(network) => {
            unsafe {
                *out_network = Box::into_raw(network);
            }
            PnmErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_network = ptr::null_mut();
            }
            code
        }
    }
}

/// Destroys a network previously created by `pnm_network_create`. Null is a no-op.
///
/// Simulations created from the network stay valid; they share the model.
///
/// # Safety
/// - The pointer MUST have been created by `pnm_network_create` and not freed already.
/// - After calling this function the caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn pnm_network_destroy(ptr: *mut PnmNetwork) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: created by `Box::into_raw` in `pnm_network_create` and not yet freed.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

/// Borrow the pores (ascending id). Valid until the network is destroyed. **DO NOT FREE.**
///
/// # Safety
/// `network` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_network_get_pores(
    network: *const PnmNetwork,
    out_len: *mut usize,
    out_array: *mut *const PnmPore,
) -> PnmErrorCode {
    match track_result(network_from_ptr(network)) {
        Ok(network) => unsafe { write_array(&network.pores, out_len, out_array) },
        Err(code) => code,
    }
}

/// Borrow the throats. Valid until the network is destroyed. **DO NOT FREE.**
///
/// # Safety
/// `network` must be null or a live handle; `out_len`/`out_array` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_network_get_throats(
    network: *const PnmNetwork,
    out_len: *mut usize,
    out_array: *mut *const PnmThroat,
) -> PnmErrorCode {
    match track_result(network_from_ptr(network)) {
        Ok(network) => unsafe { write_array(&network.throats, out_len, out_array) },
        Err(code) => code,
    }
}

/// Bulk porosity in `[0, 1]`.
///
/// # Safety
/// `network` must be null or a live handle; `out_porosity` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_network_porosity(network: *const PnmNetwork, out_porosity: *mut f64) -> PnmErrorCode {
    match track_result(network_from_ptr(network)) {
        Ok(network) => unsafe { write_out(out_porosity, network.model.porosity(), "out_porosity") },
        Err(code) => code,
    }
}

/// Directional and overall tortuosity.
///
/// # Safety
/// `network` must be null or a live handle; `out_tortuosity` must be writable.
#[no_mangle]
pub unsafe extern "C" fn pnm_network_tortuosity(
    network: *const PnmNetwork,
    out_tortuosity: *mut PnmTortuosity,
) -> PnmErrorCode {
    match track_result(network_from_ptr(network)) {
        Ok(network) => {
            let tau = network.model.directional_tortuosity();
            let value = PnmTortuosity {
                x: tau.x,
                y: tau.y,
                z: tau.z,
                overall: tau.overall(),
            };
            unsafe { write_out(out_tortuosity, value, "out_tortuosity") }
        }
        Err(code) => code,
    }
}
