//! The interest constraint language.
//!
//! A [`Constraint`] is a boolean expression tree describing which entities a
//! worker should receive. Leaves test an entity's region (absolute, or
//! relative to the subject entity that owns the interest), its id, or the
//! presence of a component type; `And` / `Or` combine sub-constraints.
//!
//! The balancer only *produces* constraints. Evaluation is done by the
//! transport, so this module deliberately has no `matches` function.
//! Constraints are plain values: a tree cannot contain cycles and serialises
//! to the same bytes whichever worker reads it.

use serde::{Deserialize, Serialize};
use spatial_math::{Aabb, Coordinates, EdgeLength};

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

/// A boolean entity filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Entities within `radius` of an absolute point.
    Sphere { center: Coordinates, radius: f64 },
    /// Entities within `radius` of a vertical axis through `center`.
    Cylinder { center: Coordinates, radius: f64 },
    /// Entities inside an absolute box centred on `center`.
    Box { center: Coordinates, edge: EdgeLength },
    /// Entities within `radius` of the subject entity.
    RelativeSphere { radius: f64 },
    /// Entities within `radius` of a vertical axis through the subject entity.
    RelativeCylinder { radius: f64 },
    /// Entities inside a box centred on the subject entity.
    RelativeBox { edge: EdgeLength },
    /// Exactly this entity.
    EntityId(EntityId),
    /// Entities that have this component type.
    ComponentType(ComponentTypeId),
    /// All sub-constraints hold.
    And(Vec<Constraint>),
    /// At least one sub-constraint holds.
    Or(Vec<Constraint>),
}

impl Constraint {
    #[must_use]
    pub fn sphere(center: Coordinates, radius: f64) -> Self {
        Self::Sphere { center, radius }
    }

    #[must_use]
    pub fn cylinder(center: Coordinates, radius: f64) -> Self {
        Self::Cylinder { center, radius }
    }

    #[must_use]
    pub fn boxed(center: Coordinates, edge: EdgeLength) -> Self {
        Self::Box { center, edge }
    }

    #[must_use]
    pub fn relative_sphere(radius: f64) -> Self {
        Self::RelativeSphere { radius }
    }

    #[must_use]
    pub fn relative_cylinder(radius: f64) -> Self {
        Self::RelativeCylinder { radius }
    }

    #[must_use]
    pub fn relative_box(edge: EdgeLength) -> Self {
        Self::RelativeBox { edge }
    }

    #[must_use]
    pub fn entity(id: EntityId) -> Self {
        Self::EntityId(id)
    }

    #[must_use]
    pub fn component(id: ComponentTypeId) -> Self {
        Self::ComponentType(id)
    }

    #[must_use]
    pub fn and(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self::And(constraints.into_iter().collect())
    }

    #[must_use]
    pub fn or(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self::Or(constraints.into_iter().collect())
    }

    /// Entities that have any of the given component types.
    #[must_use]
    pub fn any_component(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self::or(ids.into_iter().map(Self::component))
    }

    /// An absolute box covering a planar cell.
    ///
    /// The planar cell maps onto the world's `x`/`z` axes. Both planar edges
    /// are scaled by `margin` around the cell center so neighbouring workers
    /// see a strip across the border; `height` is the vertical edge length.
    #[must_use]
    pub fn from_aabb(cell: &Aabb, margin: f64, height: f64) -> Self {
        let size = cell.size();
        Self::Box {
            center: Coordinates::from_planar(cell.center()),
            edge: EdgeLength::new(size.x * margin, height, size.y * margin),
        }
    }

    /// Returns `true` for leaves resolved against the subject entity.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            Self::RelativeSphere { .. } | Self::RelativeCylinder { .. } | Self::RelativeBox { .. }
        )
    }

    /// Returns `true` if any node of the tree is relative.
    #[must_use]
    pub fn contains_relative(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().any(Constraint::contains_relative)
            }
            leaf => leaf.is_relative(),
        }
    }

    /// Depth of the tree; a lone leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(Constraint::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Number of leaves in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Constraint::leaf_count).sum()
            }
            _ => 1,
        }
    }
}
