//! Planar axis-aligned bounding boxes.
//!
//! [`Aabb`] is the shape of both the world bounds and every partition cell.
//! Containment is half-open: a point on `min` is inside, a point on `max` is
//! not, so a set of cells that tile the plane never both contain a point on
//! their shared edge.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A planar axis-aligned box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Inclusive minimum corner.
    pub min: DVec2,
    /// Exclusive maximum corner.
    pub max: DVec2,
}

impl Aabb {
    /// Create a box from its two corners.
    #[must_use]
    pub const fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Create a box from raw corner components.
    #[must_use]
    pub const fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: DVec2::new(min_x, min_y),
            max: DVec2::new(max_x, max_y),
        }
    }

    /// Returns `true` if `point` lies inside the box (`min` inclusive, `max`
    /// exclusive on both axes).
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        self.min.x <= point.x && self.max.x > point.x && self.min.y <= point.y && self.max.y > point.y
    }

    /// Size of the box along each axis.
    #[must_use]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        self.min + self.size() / 2.0
    }

    /// Area of the box. Degenerate boxes have zero area.
    #[must_use]
    pub fn area(&self) -> f64 {
        let size = self.size().max(DVec2::ZERO);
        size.x * size.y
    }

    /// The overlapping region of two boxes, if their interiors intersect.
    #[must_use]
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min.x < max.x && min.y < max.y {
            Some(Aabb { min, max })
        } else {
            None
        }
    }
}

impl std::fmt::Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{}]-[{},{}]",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let b = Aabb::from_corners(0.0, 0.0, 1024.0, 512.0);
        assert!(b.contains(DVec2::new(0.0, 0.0)));
        assert!(b.contains(DVec2::new(1023.9, 511.9)));
        assert!(!b.contains(DVec2::new(1024.0, 100.0)));
        assert!(!b.contains(DVec2::new(100.0, 512.0)));
        assert!(!b.contains(DVec2::new(-0.1, 100.0)));
    }

    #[test]
    fn test_center_and_size() {
        let b = Aabb::from_corners(1024.0, 0.0, 2048.0, 512.0);
        assert_eq!(b.size(), DVec2::new(1024.0, 512.0));
        assert_eq!(b.center(), DVec2::new(1536.0, 256.0));
        assert_eq!(b.area(), 1024.0 * 512.0);
    }

    #[test]
    fn test_intersection() {
        let a = Aabb::from_corners(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::from_corners(5.0, 5.0, 15.0, 15.0);
        assert_eq!(
            a.intersection(&b),
            Some(Aabb::from_corners(5.0, 5.0, 10.0, 10.0))
        );

        // Touching edges share no interior.
        let c = Aabb::from_corners(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_display() {
        let b = Aabb::from_corners(0.0, 512.0, 1024.0, 1024.0);
        assert_eq!(b.to_string(), "[0,512]-[1024,1024]");
    }
}
