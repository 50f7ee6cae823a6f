//! Compute context: worker pool and GPU device lifecycle
//!
//! A `ComputeContext` is built once per process (or per test) and passed by reference to
//! the generator and the simulator. It owns:
//! - the rayon pool, sized `max(1, cores − 1)` unless configured otherwise
//! - the accelerator slot; GPU device selection starts on a background thread at
//!   `init()` and is joined the first time a simulation asks for the device
//!
//! Device access goes through [`AcceleratorGuard`], which holds the slot's lock, so
//! simulations using the GPU are serialized against the single device.

use crate::error::{PoreNetworkError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Result of GPU initialization attempt
///
/// This enum distinguishes between different failure modes:
/// - `NoGpuFound`: No compatible GPU adapter (silent fallback to CPU)
/// - `InitFailed`: GPU found but initialization failed (log warning)
/// - `Disabled`: GPU use switched off by options or by the build
#[derive(Debug)]
pub enum GpuInitResult {
    /// GPU initialized successfully
    #[cfg(feature = "gpu")]
    Success(GpuDevice),
    /// No GPU adapter found (silent fallback to CPU)
    NoGpuFound,
    /// GPU found but initialization failed (log warning, fallback to CPU)
    InitFailed {
        /// Name of the adapter that failed
        adapter_name: String,
        /// Error message
        error: String,
    },
    /// GPU disabled by `ComputeOptions` or built without the `gpu` feature
    Disabled,
}

// All GPU-specific code is conditionally compiled only when "gpu" feature is enabled
#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use tracing::{debug, info, warn};

    /// GPU device managing wgpu device and queue
    ///
    /// Wraps wgpu device and queue along with adapter information.
    #[derive(Debug)]
    pub struct GpuDevice {
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    impl GpuDevice {
        /// Initialize GPU device
        ///
        /// # Returns
        ///
        /// - `GpuInitResult::Success` - GPU ready to use
        /// - `GpuInitResult::NoGpuFound` - No compatible GPU adapter
        /// - `GpuInitResult::InitFailed` - GPU found but initialization failed
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            info!("Attempting to initialize GPU device");

            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = if let Some(a) = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })) {
                debug!("Found GPU adapter: {}", a.get_info().name);
                a
            } else {
                debug!("No GPU adapter found");
                return GpuInitResult::NoGpuFound;
            };

            let adapter_info = adapter.get_info();
            let adapter_name = adapter_info.name.clone();

            // Device creation can fail even with a valid adapter
            match pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("PoreNetwork GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )) {
                Ok((device, queue)) => {
                    // Validation errors are collected through error scopes; never panic.
                    device.on_uncaptured_error(Box::new(|error| {
                        warn!("Uncaptured GPU error: {}", error);
                    }));
                    info!("GPU device initialized successfully: {}", adapter_name);
                    GpuInitResult::Success(Self {
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => {
                    debug!("Failed to create GPU device: {}", e);
                    GpuInitResult::InitFailed {
                        adapter_name,
                        error: e.to_string(),
                    }
                }
            }
        }

        /// Get adapter name for logging
        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Check if the device can hold a system of `rows` unknowns and `nnz` off-diagonals
        ///
        /// Every storage binding must fit the device's binding limit and the Jacobi
        /// dispatch must fit one dispatch dimension.
        #[must_use]
        pub fn can_allocate(&self, rows: usize, nnz: usize) -> bool {
            let limits = self.device.limits();
            let binding_limit = u64::from(limits.max_storage_buffer_binding_size);
            let largest = (rows.max(nnz) as u64).saturating_add(1).saturating_mul(4);
            let workgroups = rows.div_ceil(crate::solver::gpu::WORKGROUP_SIZE as usize) as u64;
            rows < u32::MAX as usize
                && nnz < u32::MAX as usize
                && largest <= binding_limit
                && workgroups <= u64::from(limits.max_compute_workgroups_per_dimension)
        }

        /// Get reference to wgpu device
        #[must_use]
        pub fn device(&self) -> &wgpu::Device {
            &self.device
        }

        /// Get reference to wgpu queue
        #[must_use]
        pub fn queue(&self) -> &wgpu::Queue {
            &self.queue
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_gpu_init_returns_valid_result() {
            // Which variant comes back depends on the hardware
            match GpuDevice::new() {
                GpuInitResult::Success(device) => {
                    assert!(!device.adapter_name().is_empty());
                    assert!(device.can_allocate(1024, 6 * 1024));
                    assert!(!device.can_allocate(usize::MAX / 8, 0));
                }
                GpuInitResult::NoGpuFound | GpuInitResult::Disabled => {}
                GpuInitResult::InitFailed { error, .. } => {
                    assert!(!error.is_empty());
                }
            }
        }
    }
}

#[cfg(feature = "gpu")]
pub use gpu_impl::GpuDevice;

/// Worker pool and GPU options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeOptions {
    /// Try to acquire a GPU device in the background
    pub enable_gpu: bool,
    /// Worker thread count, `None` for `max(1, cores − 1)`
    pub worker_threads: Option<usize>,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            enable_gpu: true,
            worker_threads: None,
        }
    }
}

enum AcceleratorSlot {
    Pending(JoinHandle<GpuInitResult>),
    Ready(GpuInitResult),
    Released,
}

/// Process-wide compute resources
pub struct ComputeContext {
    pool: rayon::ThreadPool,
    accelerator: Mutex<AcceleratorSlot>,
}

impl ComputeContext {
    /// Build the worker pool and start GPU device selection in the background.
    ///
    /// # Errors
    /// `WorkerPool` if the rayon pool cannot be built.
    pub fn init(options: ComputeOptions) -> Result<Self> {
        let threads = options.worker_threads.unwrap_or_else(default_worker_count).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pnm-worker-{i}"))
            .build()
            .map_err(|e| PoreNetworkError::WorkerPool(e.to_string()))?;

        let slot = if options.enable_gpu && cfg!(feature = "gpu") {
            match std::thread::Builder::new()
                .name("pnm-gpu-init".into())
                .spawn(select_device)
            {
                Ok(handle) => AcceleratorSlot::Pending(handle),
                Err(e) => {
                    warn!("Could not start GPU initialization thread: {}", e);
                    AcceleratorSlot::Ready(GpuInitResult::InitFailed {
                        adapter_name: String::from("unknown"),
                        error: e.to_string(),
                    })
                }
            }
        } else {
            AcceleratorSlot::Ready(GpuInitResult::Disabled)
        };

        info!(
            "Compute context ready: {} worker threads, GPU {}",
            threads,
            if matches!(slot, AcceleratorSlot::Pending(_)) {
                "initializing"
            } else {
                "disabled"
            }
        );
        Ok(Self {
            pool,
            accelerator: Mutex::new(slot),
        })
    }

    /// Context with a worker pool and no GPU.
    ///
    /// # Errors
    /// `WorkerPool` if the rayon pool cannot be built.
    pub fn cpu_only() -> Result<Self> {
        Self::init(ComputeOptions {
            enable_gpu: false,
            worker_threads: None,
        })
    }

    /// Process-wide context built on first use with default options.
    ///
    /// # Errors
    /// The initialization error, repeated on every call if the first attempt failed.
    pub fn shared() -> Result<&'static ComputeContext> {
        static SHARED: OnceLock<Result<ComputeContext>> = OnceLock::new();
        SHARED
            .get_or_init(|| Self::init(ComputeOptions::default()))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Run `op` inside the worker pool so nested rayon iterators use it.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Exclusive access to the accelerator, waiting for pending initialization.
    pub fn accelerator(&self) -> AcceleratorGuard<'_> {
        let mut slot = self.accelerator.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, AcceleratorSlot::Pending(_)) {
            if let AcceleratorSlot::Pending(handle) = std::mem::replace(&mut *slot, AcceleratorSlot::Released) {
                *slot = AcceleratorSlot::Ready(join_init(handle));
            }
        }
        AcceleratorGuard { slot }
    }

    /// Release the GPU device. Later simulations run on the CPU. Idempotent.
    pub fn shutdown(&self) {
        let mut slot = self.accelerator.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, AcceleratorSlot::Released) {
            AcceleratorSlot::Pending(handle) => {
                drop(join_init(handle));
                info!("Compute context shut down (GPU initialization discarded)");
            }
            AcceleratorSlot::Ready(result) => {
                drop(result);
                info!("Compute context shut down");
            }
            AcceleratorSlot::Released => debug!("Compute context already shut down"),
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().saturating_sub(1).max(1))
}

fn select_device() -> GpuInitResult {
    #[cfg(feature = "gpu")]
    {
        GpuDevice::new()
    }
    #[cfg(not(feature = "gpu"))]
    {
        GpuInitResult::Disabled
    }
}

fn join_init(handle: JoinHandle<GpuInitResult>) -> GpuInitResult {
    handle.join().unwrap_or_else(|_| GpuInitResult::InitFailed {
        adapter_name: String::from("unknown"),
        error: String::from("GPU initialization thread panicked"),
    })
}

/// Locked view of the accelerator slot
pub struct AcceleratorGuard<'a> {
    slot: MutexGuard<'a, AcceleratorSlot>,
}

impl AcceleratorGuard<'_> {
    /// Initialization outcome, `None` after [`ComputeContext::shutdown`].
    pub fn init_result(&self) -> Option<&GpuInitResult> {
        match &*self.slot {
            AcceleratorSlot::Ready(result) => Some(result),
            AcceleratorSlot::Pending(_) | AcceleratorSlot::Released => None,
        }
    }

    /// The GPU device, if one was initialized and not released.
    #[cfg(feature = "gpu")]
    pub fn device(&self) -> Option<&GpuDevice> {
        match self.init_result() {
            Some(GpuInitResult::Success(device)) => Some(device),
            _ => None,
        }
    }

    /// Whether a GPU device is available.
    pub fn has_device(&self) -> bool {
        #[cfg(feature = "gpu")]
        {
            self.device().is_some()
        }
        #[cfg(not(feature = "gpu"))]
        {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_only_context() {
        let context = ComputeContext::init(ComputeOptions {
            enable_gpu: false,
            worker_threads: Some(2),
        })
        .unwrap();
        assert_eq!(context.worker_count(), 2);
        assert!(!context.accelerator().has_device());
        assert!(matches!(
            context.accelerator().init_result(),
            Some(GpuInitResult::Disabled)
        ));
    }

    #[test]
    fn test_install_runs_in_pool() {
        let context = ComputeContext::init(ComputeOptions {
            enable_gpu: false,
            worker_threads: Some(3),
        })
        .unwrap();
        let threads = context.install(rayon::current_num_threads);
        assert_eq!(threads, 3);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let context = ComputeContext::init(ComputeOptions::default()).unwrap();
        context.shutdown();
        context.shutdown();
        let guard = context.accelerator();
        assert!(guard.init_result().is_none());
        assert!(!guard.has_device());
    }

    #[test]
    fn test_zero_workers_clamped() {
        let context = ComputeContext::init(ComputeOptions {
            enable_gpu: false,
            worker_threads: Some(0),
        })
        .unwrap();
        assert_eq!(context.worker_count(), 1);
    }
}
