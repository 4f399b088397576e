//! World-space coordinates and extents.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// A position in world space.
///
/// The world is simulated on a plane: `x` and `z` are the meaningful axes and
/// `y` is the reserved vertical axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// World X.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// World Y on the simulation plane.
    pub z: f64,
}

impl Coordinates {
    /// The world origin.
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create coordinates from all three axes.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Place a planar point on the ground plane (`y = 0`).
    #[must_use]
    pub const fn from_planar(point: DVec2) -> Self {
        Self {
            x: point.x,
            y: 0.0,
            z: point.y,
        }
    }

    /// The planar point used for partitioning: `(x, z)`.
    #[must_use]
    pub const fn planar(&self) -> DVec2 {
        DVec2::new(self.x, self.z)
    }

    /// The coordinates as a glam vector.
    #[must_use]
    pub const fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

impl From<DVec3> for Coordinates {
    fn from(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Extents of a box constraint along each axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeLength {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EdgeLength {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}
