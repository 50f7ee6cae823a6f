//! Pore network construction
//!
//! Turns a separated label volume into an immutable [`PoreNetworkModel`]:
//! 1. [`extractor`] converts particles into sphere-equivalent pores
//! 2. [`connectivity`] ranks candidate pairs and accepts throats under the degree cap
//! 3. [`flow_path`] bridges disconnected clusters so inlet and outlet connect
//! 4. [`properties`] derives porosity and directional tortuosity
//!
//! [`NetworkGenerator`] runs the stages in order on a [`crate::solver::ComputeContext`].

pub mod boundary;
pub mod config;
pub mod connectivity;
pub mod extractor;
pub mod flow_path;
mod generator;
pub mod graph;
mod model;
pub mod properties;
pub mod spatial;
pub mod synthetic;

pub use boundary::BoundaryZones;
pub use config::GenerationConfig;
pub use flow_path::FlowPathReport;
pub use generator::NetworkGenerator;
pub use graph::ThroatGraph;
pub use model::{BoundingBox, DirectionalTortuosity, PoreNetworkModel};
pub use spatial::SpatialIndex;
pub use synthetic::SyntheticPacking;
