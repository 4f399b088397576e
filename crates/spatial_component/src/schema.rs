//! Payload structs for the well-known component types.

use serde::{Deserialize, Serialize};
use spatial_math::{Coordinates, DVec2};

use crate::component::{Component, ComponentTypeId, ids};

/// World position of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coords: Coordinates,
}

impl Position {
    #[must_use]
    pub const fn new(coords: Coordinates) -> Self {
        Self { coords }
    }

    /// A position on the ground plane at a planar point.
    #[must_use]
    pub const fn from_planar(point: DVec2) -> Self {
        Self {
            coords: Coordinates::from_planar(point),
        }
    }

    /// The planar point used for partitioning.
    #[must_use]
    pub const fn planar(&self) -> DVec2 {
        self.coords.planar()
    }
}

impl Component for Position {
    const TYPE_ID: ComponentTypeId = ids::POSITION;

    fn type_name() -> &'static str {
        "Position"
    }
}

/// Display name of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

impl Metadata {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for Metadata {
    const TYPE_ID: ComponentTypeId = ids::METADATA;

    fn type_name() -> &'static str {
        "Metadata"
    }
}

/// The role a connected worker plays, parsed from its worker type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// A simulation worker that can hold spatial authority.
    Server,
    /// A human player's client.
    LauncherClient,
    /// An automated client.
    Bot,
    /// The balancer itself.
    Balancer,
    /// Any worker type the balancer has no policy for.
    Other(String),
}

impl WorkerRole {
    #[must_use]
    pub fn parse(worker_type: &str) -> Self {
        match worker_type {
            "Server" => Self::Server,
            "LauncherClient" => Self::LauncherClient,
            "Bot" => Self::Bot,
            "Balancer" => Self::Balancer,
            other => Self::Other(other.to_string()),
        }
    }

    /// The worker type string the transport reports for this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server => "Server",
            Self::LauncherClient => "LauncherClient",
            Self::Bot => "Bot",
            Self::Balancer => "Balancer",
            Self::Other(s) => s,
        }
    }

    /// Clients own a ship and count towards the fleet's load signal.
    #[must_use]
    pub fn is_client(&self) -> bool {
        matches!(self, Self::LauncherClient | Self::Bot)
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a connected worker, attached by the transport to the worker's
/// own system entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub worker_type: String,
}

impl WorkerIdentity {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, worker_type: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_type: worker_type.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> WorkerRole {
        WorkerRole::parse(&self.worker_type)
    }
}

impl Component for WorkerIdentity {
    const TYPE_ID: ComponentTypeId = ids::WORKER;

    fn type_name() -> &'static str {
        "Worker"
    }
}

/// Index of the partition cell (and so the worker) an entity belongs to.
///
/// `-1` means unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub worker_index: i32,
}

impl WorkerAssignment {
    pub const UNASSIGNED: Self = Self { worker_index: -1 };

    #[must_use]
    pub fn from_index(index: Option<usize>) -> Self {
        let worker_index = index
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1);
        Self { worker_index }
    }

    /// The assigned index, or `None` when unassigned.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.worker_index).ok()
    }
}

impl Default for WorkerAssignment {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl Component for WorkerAssignment {
    const TYPE_ID: ComponentTypeId = ids::WORKER_ASSIGNMENT;

    fn type_name() -> &'static str {
        "WorkerAssignment"
    }
}

/// Gameplay state of a ship as seeded at creation. Simulation workers own
/// every later update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipState {
    pub current_energy: f32,
    pub max_energy: f32,
    pub charge_rate: f32,
    pub pos: DVec2,
    pub vel: DVec2,
    pub angle: f32,
}

impl ShipState {
    /// A fresh ship at rest with a full charge.
    #[must_use]
    pub fn spawned_at(pos: DVec2) -> Self {
        Self {
            current_energy: 100.0,
            max_energy: 100.0,
            charge_rate: 10.0,
            pos,
            vel: DVec2::ZERO,
            angle: 0.0,
        }
    }
}

impl Component for ShipState {
    const TYPE_ID: ComponentTypeId = ids::SHIP;

    fn type_name() -> &'static str {
        "Ship"
    }
}
