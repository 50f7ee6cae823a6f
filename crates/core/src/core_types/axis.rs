//! Flow axis selection

use super::vec3::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Principal axis along which boundary zones are chosen and flow is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowAxis {
    /// Flow along x
    X,
    /// Flow along y
    Y,
    /// Flow along z (the scan direction of most CT stacks)
    #[default]
    Z,
}

impl FlowAxis {
    /// All three axes in x, y, z order.
    pub const ALL: [FlowAxis; 3] = [FlowAxis::X, FlowAxis::Y, FlowAxis::Z];

    /// Component index (0, 1 or 2).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// The two component indices orthogonal to this axis.
    #[inline]
    pub const fn orthogonal(self) -> (usize, usize) {
        match self {
            Self::X => (1, 2),
            Self::Y => (0, 2),
            Self::Z => (0, 1),
        }
    }

    /// Component of `v` along this axis.
    #[inline]
    pub fn component(self, v: &Vec3) -> f64 {
        v[self.index()]
    }
}

impl fmt::Display for FlowAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        };
        f.write_str(name)
    }
}

impl FromStr for FlowAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            other => Err(format!("unknown flow axis '{other}', expected x, y or z")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_and_orthogonal() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(FlowAxis::X.component(&v), 1.0);
        assert_eq!(FlowAxis::Y.component(&v), 2.0);
        assert_eq!(FlowAxis::Z.component(&v), 3.0);
        assert_eq!(FlowAxis::Y.orthogonal(), (0, 2));
    }

    #[test]
    fn test_parse() {
        assert_eq!("x".parse::<FlowAxis>().unwrap(), FlowAxis::X);
        assert_eq!(" Z ".parse::<FlowAxis>().unwrap(), FlowAxis::Z);
        assert!("w".parse::<FlowAxis>().is_err());
    }
}
