//! Unit conversions and semantic unit types
//!
//! Pore geometry is stored in micrometres (µm, µm², µm³) while the solver works in SI.
//! Permeability is reported through a newtype so callers pick the unit explicitly.
//!
//! # Usage
//! ```
//! use pore_network_core::core_types::units::{meters_to_micrometers, Permeability};
//!
//! assert!((meters_to_micrometers(4.0e-6) - 4.0).abs() < 1e-12);
//!
//! let k = Permeability::from_square_meters(9.869233e-13);
//! assert!((k.darcy() - 1.0).abs() < 1e-12);
//! assert!((k.millidarcy() - 1000.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Metres per micrometre.
pub const METERS_PER_MICROMETER: f64 = 1.0e-6;

/// Micrometres per metre.
pub const MICROMETERS_PER_METER: f64 = 1.0e6;

/// One Darcy expressed in m².
pub const SQUARE_METERS_PER_DARCY: f64 = 9.869233e-13;

/// Convert a length in metres to micrometres.
#[inline]
pub fn meters_to_micrometers(meters: f64) -> f64 {
    meters * MICROMETERS_PER_METER
}

/// Convert an area in m² to µm².
#[inline]
pub fn square_meters_to_square_micrometers(area: f64) -> f64 {
    area * MICROMETERS_PER_METER * MICROMETERS_PER_METER
}

/// Convert a volume in m³ to µm³.
#[inline]
pub fn cubic_meters_to_cubic_micrometers(volume: f64) -> f64 {
    volume * MICROMETERS_PER_METER * MICROMETERS_PER_METER * MICROMETERS_PER_METER
}

// ============================================================================
// PERMEABILITY
// ============================================================================

/// Absolute permeability, stored in m²
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Permeability(f64);

impl Deref for Permeability {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Permeability {
    /// Wrap a permeability given in m²
    #[inline]
    #[must_use]
    pub fn from_square_meters(value: f64) -> Self {
        Permeability(value)
    }

    /// Value in m²
    #[inline]
    #[must_use]
    pub fn square_meters(self) -> f64 {
        self.0
    }

    /// Value in Darcy
    #[inline]
    #[must_use]
    pub fn darcy(self) -> f64 {
        self.0 / SQUARE_METERS_PER_DARCY
    }

    /// Value in milliDarcy
    #[inline]
    #[must_use]
    pub fn millidarcy(self) -> f64 {
        self.darcy() * 1000.0
    }
}

impl fmt::Display for Permeability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4e} m² ({:.4} mD)", self.0, self.millidarcy())
    }
}
