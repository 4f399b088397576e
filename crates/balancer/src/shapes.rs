//! Component sets of the entities the balancer creates or rewrites.

use spatial_component::acl::{BALANCER_ATTRIBUTE, CLIENT_ATTRIBUTE, POSITION_ATTRIBUTE};
use spatial_component::{
    ComponentValue, Constraint, EntityAcl, EntityId, Interest, Metadata, Position, Query, ShipState,
    WorkerAssignment, WorkerRequirementSet, ids,
};
use spatial_math::{Aabb, DVec2, EdgeLength};

/// Metadata name carried by worker anchors.
pub const SERVER_METADATA: &str = "Server";

/// Metadata name carried by client ships.
pub const CLIENT_METADATA: &str = "Client";

/// Radius of a freshly spawned ship's input interest.
pub const SHIP_INPUT_RADIUS: f64 = 100.0;

/// Relative box a ship keeps in view once it knows its own id.
pub const SHIP_VIEW_EDGE: EdgeLength = EdgeLength::new(800.0, 30_000.0, 300.0);

fn balancer() -> WorkerRequirementSet {
    WorkerRequirementSet::single(BALANCER_ATTRIBUTE)
}

fn physical() -> WorkerRequirementSet {
    WorkerRequirementSet::single(POSITION_ATTRIBUTE)
}

fn visible_to_simulation() -> WorkerRequirementSet {
    WorkerRequirementSet::any_of([BALANCER_ATTRIBUTE, POSITION_ATTRIBUTE, CLIENT_ATTRIBUTE])
}

/// The anchor created for a newly registered simulation worker. It stays
/// with the balancer until the first rebalance gives it a region.
#[must_use]
pub fn worker_anchor() -> Vec<ComponentValue> {
    let acl = EntityAcl::new(balancer())
        .with_writer(ids::ACL, balancer())
        .with_writer(ids::INTEREST, balancer())
        .with_writer(ids::POSITION, balancer());
    vec![
        acl.into(),
        Metadata::new(SERVER_METADATA).into(),
        Position::default().into(),
        Interest::new().into(),
    ]
}

/// The updates that hand a worker anchor its region.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRegion {
    pub acl: EntityAcl,
    pub interest: Interest,
    pub position: Position,
}

impl WorkerRegion {
    /// Build the region shape for `cell`.
    ///
    /// The interest fires on the anchor's position and streams every ship,
    /// bullet, effect and player input inside the cell grown by `margin`.
    #[must_use]
    pub fn for_cell(cell: &Aabb, margin: f64, height: f64) -> Self {
        let acl = EntityAcl::new(visible_to_simulation())
            .with_writer(ids::ACL, balancer())
            .with_writer(ids::INTEREST, balancer())
            .with_writer(ids::POSITION, balancer());

        let constraint = Constraint::and([
            Constraint::from_aabb(cell, margin, height),
            Constraint::any_component([ids::SHIP, ids::BULLET, ids::EFFECT, ids::PLAYER_INPUT]),
        ]);
        let query = Query::new(constraint).returning([
            ids::SHIP,
            ids::POSITION,
            ids::EFFECT,
            ids::BULLET,
            ids::PLAYER_INPUT,
        ]);

        Self {
            acl,
            interest: Interest::new().with_query(ids::POSITION, query),
            position: Position::from_planar(cell.center()),
        }
    }

    /// The updates in send order. The ACL goes last so the balancer still
    /// holds write access while the other two land.
    #[must_use]
    pub fn into_updates(self) -> [ComponentValue; 3] {
        [self.position.into(), self.interest.into(), self.acl.into()]
    }
}

/// Access descriptor of a client's ship before any worker owns it.
#[must_use]
pub fn ship_acl(client_id: &str) -> EntityAcl {
    EntityAcl::new(WorkerRequirementSet::any_of([POSITION_ATTRIBUTE, CLIENT_ATTRIBUTE]))
        .with_writer(ids::ACL, balancer())
        .with_writer(ids::INTEREST, balancer())
        .with_writer(ids::WORKER_ASSIGNMENT, balancer())
        .with_writer(ids::PLAYER_INPUT, WorkerRequirementSet::worker(client_id))
        .with_writer(ids::SHIP, physical())
        .with_writer(ids::POSITION, physical())
}

/// The components of a new ship for `client_id` at `spawn`.
#[must_use]
pub fn client_ship(client_id: &str, spawn: DVec2) -> Vec<ComponentValue> {
    let interest = Interest::new().with_query(
        ids::PLAYER_INPUT,
        Query::new(Constraint::relative_sphere(SHIP_INPUT_RADIUS)).returning([
            ids::SHIP,
            ids::POSITION,
            ids::METADATA,
        ]),
    );
    vec![
        ship_acl(client_id).into(),
        Metadata::new(CLIENT_METADATA).into(),
        Position::from_planar(spawn).into(),
        ShipState::spawned_at(spawn).into(),
        interest.into(),
        WorkerAssignment::UNASSIGNED.into(),
    ]
}

/// Interest of a ship once its id is known: itself, plus every nearby ship
/// or bullet.
#[must_use]
pub fn ship_interest(ship: EntityId) -> Interest {
    let nearby = Constraint::and([
        Constraint::relative_box(SHIP_VIEW_EDGE),
        Constraint::any_component([ids::SHIP, ids::BULLET]),
    ]);
    Interest::new().with_query(
        ids::PLAYER_INPUT,
        Query::new(Constraint::or([Constraint::entity(ship), nearby])).returning([
            ids::SHIP,
            ids::BULLET,
            ids::POSITION,
        ]),
    )
}
