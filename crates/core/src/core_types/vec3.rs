//! Vector type alias for 3D positions.

use nalgebra::Vector3;

/// 3D vector type for pore centers and bounding-box corners.
///
/// Alias for `nalgebra::Vector3<f64>`; components are in micrometres unless a
/// function says otherwise.
pub type Vec3 = Vector3<f64>;
