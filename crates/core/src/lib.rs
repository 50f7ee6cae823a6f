//! Pore Network Core Library
//!
//! Builds pore network models from separated micro-CT label volumes and simulates
//! single-phase absolute permeability over them with Darcy's law.
//!
//! ## Pipeline
//!
//! - Pore extraction: one sphere-equivalent pore per labelled particle
//! - Connectivity: distance and overlap criterion with a per-pore degree cap
//! - Flow-path enforcement: bridges disconnected clusters between inlet and outlet
//! - Network properties: porosity and directional tortuosity
//! - Permeability: Hagen-Poiseuille conductances, CPU Gauss-Seidel or GPU Jacobi solve
//!
//! All heavy work runs on a [`ComputeContext`], created once and shared by reference.

// Cancellation and progress reporting
pub mod control;

// Core types and utilities
pub mod core_types;

pub mod error;

// Network construction
pub mod network;

// Permeability simulation
pub mod simulation;

// Linear solvers and compute resources
pub mod solver;

// Re-export core types
pub use core_types::{FlowAxis, LabelVolume, Particle, Permeability, Pore, SeparatedVolume, Throat, Vec3};

pub use control::{CancellationToken, NoProgress, ProgressSink};
pub use error::{PoreNetworkError, Result};

// Re-export network types
pub use network::{DirectionalTortuosity, GenerationConfig, NetworkGenerator, PoreNetworkModel, SyntheticPacking};

// Re-export simulation types
pub use simulation::{PermeabilitySimulationResult, PermeabilitySimulator, ResultValidity, SimulationParams};

// Re-export solver types
pub use solver::{ComputeContext, ComputeOptions, GpuInitResult, SolveReport, SolverBackend, SolverSettings};
