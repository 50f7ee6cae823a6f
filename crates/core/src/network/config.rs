//! Network generation parameters

use crate::core_types::FlowAxis;
use crate::error::{require_non_negative, require_positive, PoreNetworkError, Result};
use serde::{Deserialize, Serialize};

/// Parameters controlling pore extraction and throat generation
///
/// The degree cap and the throat radius factor are empirical; they are exposed as
/// parameters rather than baked into the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Voxel pitch in metres per voxel
    pub pixel_size: f64,
    /// Maximum throat length as a multiple of the mean pore radius
    pub max_throat_length_factor: f64,
    /// Minimum `max(0, r1 + r2 − d) / min(r1, r2)` for two pores to connect
    pub min_overlap_factor: f64,
    /// Maximum number of throats per pore (degree cap)
    pub max_connections: usize,
    /// Throat radius as a fraction of the smaller pore radius
    pub throat_radius_factor: f64,
    /// Lower bound on throat length in µm
    pub min_throat_length: f64,
    /// Face-area correction applied to each exposed boundary voxel
    pub surface_area_factor: f64,
    /// Bridge disconnected clusters when inlet and outlet are not connected
    pub enforce_flow_path: bool,
    /// Axis whose boundary zones must be connected when `enforce_flow_path` is set
    pub flow_path_axis: FlowAxis,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            pixel_size: 1.0e-6,
            max_throat_length_factor: 3.0,
            min_overlap_factor: 0.1,
            max_connections: 6,
            throat_radius_factor: 0.4,
            min_throat_length: 0.1,
            surface_area_factor: 1.5,
            enforce_flow_path: true,
            flow_path_axis: FlowAxis::Z,
        }
    }
}

impl GenerationConfig {
    /// Default parameters for a volume with the given voxel pitch (m/voxel).
    pub fn with_pixel_size(pixel_size: f64) -> Self {
        Self {
            pixel_size,
            ..Self::default()
        }
    }

    /// Check every parameter range.
    ///
    /// # Errors
    /// `InvalidParameter` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        require_positive("pixel_size", self.pixel_size)?;
        require_non_negative("max_throat_length_factor", self.max_throat_length_factor)?;
        require_non_negative("min_overlap_factor", self.min_overlap_factor)?;
        require_positive("min_throat_length", self.min_throat_length)?;
        require_positive("surface_area_factor", self.surface_area_factor)?;
        if self.max_connections == 0 {
            return Err(PoreNetworkError::invalid_parameter(
                "max_connections",
                "must allow at least one throat per pore",
            ));
        }
        if !(self.throat_radius_factor > 0.0 && self.throat_radius_factor <= 1.0) {
            return Err(PoreNetworkError::invalid_parameter(
                "throat_radius_factor",
                format!("must lie in (0, 1], got {}", self.throat_radius_factor),
            ));
        }
        Ok(())
    }
}
