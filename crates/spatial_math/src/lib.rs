//! # spatial_math
//!
//! Math types for the spatial balancer. Re-exports [`glam`] for linear
//! algebra and defines the world-space types shared by the constraint
//! language and the partition grid.
//!
//! - [`Coordinates`]: a 3-D world position. `y` is the vertical axis and is
//!   not used for partitioning; the planar point is `(x, z)`.
//! - [`EdgeLength`]: box extents along each axis.
//! - [`Aabb`]: a planar axis-aligned box with an inclusive minimum and an
//!   exclusive maximum.

pub mod aabb;
pub mod coordinates;

// Re-export glam types for convenience.
pub use glam::{DVec2, DVec3};

pub use aabb::Aabb;
pub use coordinates::{Coordinates, EdgeLength};
