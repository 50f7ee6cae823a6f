//! GPU-based linear solver implementation
//!
//! This module provides a GPU implementation of the `LinearSystemSolver` trait using
//! wgpu compute shaders and storage buffers. This backend is only available when the
//! `gpu` feature is enabled.
//!
//! # Shader Files
//!
//! - `shaders/jacobi.wgsl` - one Jacobi sweep plus the max-norm of the update
//!
//! # Implementation
//!
//! Rows are normalised on the host (`x_i = c_i + Σ w_ij x_j`) and uploaded as f32 CSR.
//! Two iterate buffers ping-pong between dispatches, so no copy kernel is needed. The
//! residual word is cleared before the last dispatch of each batch and read back once
//! per batch, which keeps host/device round-trips to one every 16 iterations.

use super::context::GpuDevice;
use super::r#trait::{LinearSystemSolver, Solution, SolveReport, SolverBackend, SolverSettings};
use super::system::LinearSystem;
use crate::control::CancellationToken;
use crate::error::{PoreNetworkError, Result};
use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

/// Threads per workgroup, must match `@workgroup_size` in `jacobi.wgsl`.
pub(crate) const WORKGROUP_SIZE: u32 = 256;

/// Iterations between residual readbacks.
const CHECK_INTERVAL: u32 = 16;

/// Jacobi shader parameters (must match WGSL struct layout)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct JacobiParams {
    rows: u32,
    inv_scale: f32,
    _pad0: u32,
    _pad1: u32,
}

/// Host-side f32 copy of a normalised system
struct NormalizedSystem {
    row_ptr: Vec<u32>,
    col_idx: Vec<u32>,
    weights: Vec<f32>,
    bias: Vec<f32>,
    guess: Vec<f32>,
}

impl NormalizedSystem {
    fn from_system(system: &LinearSystem) -> Result<Self> {
        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| PoreNetworkError::GpuSolverFailure(format!("index {v} exceeds u32")))
        };
        let n = system.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        for &p in system.row_ptr() {
            row_ptr.push(to_u32(p)?);
        }
        let mut col_idx = Vec::with_capacity(system.nnz());
        let mut weights = Vec::with_capacity(system.nnz());
        for i in 0..n {
            let d = system.diagonal()[i];
            for k in system.row_ptr()[i]..system.row_ptr()[i + 1] {
                col_idx.push(to_u32(system.col_idx()[k])?);
                weights.push((-system.values()[k] / d) as f32);
            }
        }
        let bias = (0..n).map(|i| (system.rhs()[i] / system.diagonal()[i]) as f32).collect();
        let guess = system.initial_guess().iter().map(|&v| v as f32).collect();

        // wgpu rejects zero-sized bindings
        if col_idx.is_empty() {
            col_idx.push(0);
            weights.push(0.0);
        }
        Ok(Self {
            row_ptr,
            col_idx,
            weights,
            bias,
            guess,
        })
    }
}

/// Double-buffered Jacobi solver on a wgpu device
pub struct GpuJacobiSolver<'a> {
    device: &'a GpuDevice,
    settings: SolverSettings,
}

impl<'a> GpuJacobiSolver<'a> {
    /// Create a solver on `device`.
    pub fn new(device: &'a GpuDevice, settings: SolverSettings) -> Self {
        Self { device, settings }
    }

    fn run(&self, system: &LinearSystem, cancel: &CancellationToken) -> Result<Solution> {
        let n = system.len();
        let host = NormalizedSystem::from_system(system)?;
        let device = self.device.device();
        let queue = self.device.queue();
        let rows = u32::try_from(n).map_err(|_| PoreNetworkError::GpuSolverFailure("too many rows".into()))?;
        let x_bytes = (n * std::mem::size_of::<f32>()) as u64;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let storage = |label: &str, contents: &[u8], extra: wgpu::BufferUsages| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | extra,
            })
        };
        let row_ptr = storage("Jacobi Row Ptr", bytemuck::cast_slice(&host.row_ptr), wgpu::BufferUsages::empty());
        let col_idx = storage("Jacobi Col Idx", bytemuck::cast_slice(&host.col_idx), wgpu::BufferUsages::empty());
        let weights = storage("Jacobi Weights", bytemuck::cast_slice(&host.weights), wgpu::BufferUsages::empty());
        let bias = storage("Jacobi Bias", bytemuck::cast_slice(&host.bias), wgpu::BufferUsages::empty());
        let x_a = storage("Jacobi X A", bytemuck::cast_slice(&host.guess), wgpu::BufferUsages::COPY_SRC);
        let x_b = storage("Jacobi X B", bytemuck::cast_slice(&host.guess), wgpu::BufferUsages::COPY_SRC);
        let residual = storage(
            "Jacobi Residual",
            bytemuck::bytes_of(&0u32),
            wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Jacobi Params"),
            contents: bytemuck::bytes_of(&JacobiParams {
                rows,
                inv_scale: (1.0 / system.pressure_scale()) as f32,
                _pad0: 0,
                _pad1: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let residual_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Jacobi Residual Staging"),
            size: 4,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let x_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Jacobi X Staging"),
            size: x_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/jacobi.wgsl"));
        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Jacobi Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, false),
                storage_entry(6, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Jacobi Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Jacobi Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "jacobi_step",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        let bind_group = |label: &str, x_in: &wgpu::Buffer, x_out: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: row_ptr.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: col_idx.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: weights.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 3, resource: bias.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 4, resource: x_in.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 5, resource: x_out.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 6, resource: residual.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 7, resource: params.as_entire_binding() },
                ],
            })
        };
        // even iterations read A and write B, odd iterations the reverse
        let groups = [bind_group("Jacobi A->B", &x_a, &x_b), bind_group("Jacobi B->A", &x_b, &x_a)];

        pop_scope(device)?;
        pop_scope(device)?;

        let workgroups = rows.div_ceil(WORKGROUP_SIZE);
        let mut report = SolveReport {
            backend: SolverBackend::GpuJacobi,
            iterations: 0,
            residual: f64::INFINITY,
            converged: false,
        };

        while report.iterations < self.settings.max_iterations {
            cancel.check()?;
            let batch = CHECK_INTERVAL.min(self.settings.max_iterations - report.iterations);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Jacobi Batch Encoder"),
            });
            for k in 0..batch {
                if k + 1 == batch {
                    encoder.clear_buffer(&residual, 0, None);
                }
                let parity = ((report.iterations + k) % 2) as usize;
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Jacobi Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &groups[parity], &[]);
                pass.dispatch_workgroups(workgroups, 1, 1);
            }
            encoder.copy_buffer_to_buffer(&residual, 0, &residual_staging, 0, 4);
            queue.submit(std::iter::once(encoder.finish()));

            let bits: Vec<u32> = read_buffer(device, &residual_staging)?;
            report.iterations += batch;
            report.residual = f64::from(f32::from_bits(bits[0]));

            if !report.residual.is_finite() {
                return Err(PoreNetworkError::GpuSolverFailure(format!(
                    "non-finite residual after {} iterations",
                    report.iterations
                )));
            }
            if report.residual <= self.settings.tolerance {
                report.converged = true;
                break;
            }
        }

        // after an odd number of sweeps the newest iterate lives in B
        let latest = if report.iterations % 2 == 1 { &x_b } else { &x_a };
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Jacobi Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(latest, 0, &x_staging, 0, x_bytes);
        queue.submit(std::iter::once(encoder.finish()));
        let values: Vec<f32> = read_buffer(device, &x_staging)?;

        let pressures: Vec<f64> = (0..n)
            .map(|i| {
                if system.is_identity_row(i) {
                    system.rhs()[i] / system.diagonal()[i]
                } else {
                    f64::from(values[i])
                }
            })
            .collect();
        if pressures.iter().any(|p| !p.is_finite()) {
            return Err(PoreNetworkError::GpuSolverFailure("non-finite pressure in readback".into()));
        }

        debug!(
            "GPU Jacobi: {} iterations, residual {:.3e}, converged {}",
            report.iterations, report.residual, report.converged
        );
        Ok(Solution { pressures, report })
    }
}

impl LinearSystemSolver for GpuJacobiSolver<'_> {
    fn solve(&self, system: &LinearSystem, cancel: &CancellationToken) -> Result<Solution> {
        if system.is_empty() {
            return Ok(Solution {
                pressures: Vec::new(),
                report: SolveReport {
                    backend: SolverBackend::GpuJacobi,
                    iterations: 0,
                    residual: 0.0,
                    converged: true,
                },
            });
        }
        if !self.device.can_allocate(system.len(), system.nnz()) {
            return Err(PoreNetworkError::GpuUnavailable(format!(
                "{} rows / {} entries exceed device limits of {}",
                system.len(),
                system.nnz(),
                self.device.adapter_name()
            )));
        }
        self.run(system, cancel)
    }

    fn backend(&self) -> SolverBackend {
        SolverBackend::GpuJacobi
    }
}

fn pop_scope(device: &wgpu::Device) -> Result<()> {
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(PoreNetworkError::GpuSolverFailure(error.to_string())),
        None => Ok(()),
    }
}

fn read_buffer<T: Pod>(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(PoreNetworkError::GpuSolverFailure(format!("buffer map failed: {e}"))),
        Err(_) => return Err(PoreNetworkError::GpuSolverFailure("buffer map callback dropped".into())),
    }
    let data = slice.get_mapped_range();
    let values: Vec<T> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    buffer.unmap();
    Ok(values)
}
