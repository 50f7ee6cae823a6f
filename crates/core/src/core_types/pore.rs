//! Pore and throat network elements
//!
//! All geometry is in micrometres. A pore is a sphere-equivalent void; a throat is a
//! cylinder joining two pores.

use super::vec3::Vec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Sphere-equivalent void region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pore {
    /// Unique, stable identifier (the particle label)
    pub id: u32,
    /// Volume in µm³
    pub volume: f64,
    /// Surface area in µm²
    pub area: f64,
    /// Sphere-equivalent radius in µm
    pub radius: f64,
    /// Centroid in µm
    pub center: Vec3,
    /// Number of throats referencing this pore
    pub connection_count: u32,
}

impl Pore {
    /// Create a pore with no connections.
    pub fn new(id: u32, volume: f64, area: f64, radius: f64, center: Vec3) -> Self {
        Self {
            id,
            volume,
            area,
            radius,
            center,
            connection_count: 0,
        }
    }

    /// Create an ideal sphere of `radius` µm centred at `center`.
    pub fn sphere(id: u32, radius: f64, center: Vec3) -> Self {
        let volume = 4.0 / 3.0 * PI * radius.powi(3);
        let area = 4.0 * PI * radius * radius;
        Self::new(id, volume, area, radius, center)
    }

    /// Centroid distance to `other` in µm.
    #[inline]
    pub fn distance_to(&self, other: &Pore) -> f64 {
        (self.center - other.center).norm()
    }
}

/// Cylindrical conduit between two pores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Throat {
    /// Identifier, unique within a network
    pub id: u32,
    /// Smaller of the two pore ids
    pub pore_id1: u32,
    /// Larger of the two pore ids
    pub pore_id2: u32,
    /// Radius in µm
    pub radius: f64,
    /// Length in µm
    pub length: f64,
    /// Volume in µm³ (cylinder)
    pub volume: f64,
}

impl Throat {
    /// Build the throat joining `a` and `b`.
    ///
    /// Radius is `radius_factor · min(r1, r2)`, length is
    /// `max(min_length, d − r1 − r2)` and volume is `π·r²·L`. The pore ids are stored in
    /// ascending order. Returns `None` for a self loop.
    pub fn between(id: u32, a: &Pore, b: &Pore, radius_factor: f64, min_length: f64) -> Option<Self> {
        if a.id == b.id {
            return None;
        }
        let (first, second) = if a.id < b.id { (a, b) } else { (b, a) };
        let distance = first.distance_to(second);
        let radius = radius_factor * first.radius.min(second.radius);
        let length = (distance - first.radius - second.radius).max(min_length);
        Some(Self {
            id,
            pore_id1: first.id,
            pore_id2: second.id,
            radius,
            length,
            volume: PI * radius * radius * length,
        })
    }

    /// Whether `pore_id` is one of the endpoints.
    #[inline]
    pub fn connects(&self, pore_id: u32) -> bool {
        self.pore_id1 == pore_id || self.pore_id2 == pore_id
    }

    /// The endpoint opposite `pore_id`, if `pore_id` is an endpoint.
    #[inline]
    pub fn other_end(&self, pore_id: u32) -> Option<u32> {
        if self.pore_id1 == pore_id {
            Some(self.pore_id2)
        } else if self.pore_id2 == pore_id {
            Some(self.pore_id1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_throat_geometry_formulas() {
        let a = Pore::sphere(7, 10.0, Vec3::new(0.0, 0.0, 0.0));
        let b = Pore::sphere(3, 20.0, Vec3::new(0.0, 0.0, 25.0));

        let throat = Throat::between(0, &a, &b, 0.4, 0.1).unwrap();
        assert_eq!(throat.pore_id1, 3);
        assert_eq!(throat.pore_id2, 7);
        assert_relative_eq!(throat.radius, 4.0);
        // 25 - 10 - 20 is negative, so the minimum length applies
        assert_relative_eq!(throat.length, 0.1);
        assert_relative_eq!(throat.volume, PI * 16.0 * 0.1);
    }

    #[test]
    fn test_throat_length_from_gap() {
        let a = Pore::sphere(1, 5.0, Vec3::new(0.0, 0.0, 0.0));
        let b = Pore::sphere(2, 5.0, Vec3::new(30.0, 0.0, 0.0));
        let throat = Throat::between(4, &a, &b, 0.4, 0.1).unwrap();
        assert_relative_eq!(throat.length, 20.0);
        assert_eq!(throat.other_end(1), Some(2));
        assert_eq!(throat.other_end(9), None);
        assert!(throat.connects(2));
    }

    #[test]
    fn test_self_loop_rejected() {
        let a = Pore::sphere(1, 5.0, Vec3::zeros());
        assert!(Throat::between(0, &a, &a, 0.4, 0.1).is_none());
    }
}
