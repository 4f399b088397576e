//! The balancer's reactive core.
//!
//! [`Coordinator`] owns every registry and reacts to one [`WorldOp`] at a
//! time. It never performs I/O itself: writes are queued on its [`Outbox`]
//! and process control goes through a [`ProcessHost`].
//!
//! ## Worker lifecycle
//!
//! 1. A worker-identity component appears on some entity.
//! 2. Simulation workers get an anchor entity; once its creation is
//!    acknowledged the worker joins the roster and the grid is recomputed.
//!    Clients get a ship.
//! 3. When the identity component disappears, the worker's anchor and every
//!    entity it owned exclusively are deleted and the grid is recomputed.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use spatial_component::{
    ComponentError, ComponentRegistry, ComponentTypeId, ComponentValue, EntityAcl, EntityId,
    Position, RequestId, WorkerIdentity, WorkerRole, ids,
};
use spatial_math::{Aabb, DVec2};
use spatial_net::{Authority, WorldCommand, WorldOp};
use tracing::{debug, error, info, trace, warn};

use crate::config::BalancerConfig;
use crate::entities::EntityRegistry;
use crate::fleet::FleetManager;
use crate::outbox::Outbox;
use crate::process::{ProcessClass, ProcessEvent, ProcessHost};
use crate::reconciler::{self, Reconciler, Reconciliation};
use crate::roster::{WorkerRecord, WorkerRoster};
use crate::shapes;

/// Whether the event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// A connected client worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub worker_id: String,
    pub role: WorkerRole,
}

/// What an outstanding entity creation was for.
#[derive(Debug, Clone, PartialEq)]
enum PendingCreate {
    WorkerAnchor {
        worker_id: String,
        identity_entity: EntityId,
    },
    ClientShip {
        client_id: String,
        acl: EntityAcl,
        spawn: DVec2,
    },
    /// The worker left before its anchor was acknowledged.
    Abandoned,
}

impl PendingCreate {
    fn is_anchor_for(&self, identity: EntityId) -> bool {
        matches!(
            self,
            PendingCreate::WorkerAnchor { identity_entity, .. } if *identity_entity == identity
        )
    }
}

pub struct Coordinator<H> {
    config: BalancerConfig,
    components: ComponentRegistry,
    entities: EntityRegistry,
    roster: WorkerRoster,
    fleet: FleetManager,
    /// Connected clients keyed by their identity entity.
    clients: HashMap<EntityId, ClientRecord>,
    pending: HashMap<RequestId, PendingCreate>,
    /// Entities whose ACL the balancer is authoritative over.
    acl_authority: HashSet<EntityId>,
    /// Set once the roster first reached the fleet target.
    grid_formed: bool,
    outbox: Outbox,
    host: H,
}

impl<H: ProcessHost> Coordinator<H> {
    #[must_use]
    pub fn new(config: BalancerConfig, host: H) -> Self {
        let fleet = FleetManager::new(config.bot_flag.clone());
        Self {
            config,
            components: ComponentRegistry::with_known_components(),
            entities: EntityRegistry::new(),
            roster: WorkerRoster::new(),
            fleet,
            clients: HashMap::new(),
            pending: HashMap::new(),
            acl_authority: HashSet::new(),
            grid_formed: false,
            outbox: Outbox::new(),
            host,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    #[must_use]
    pub fn roster(&self) -> &WorkerRoster {
        &self.roster
    }

    #[must_use]
    pub fn fleet(&self) -> &FleetManager {
        &self.fleet
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Take the writes queued since the last call.
    pub fn drain_commands(&mut self) -> Vec<WorldCommand> {
        self.outbox.drain()
    }

    /// Bring the fleet up to its minimum size.
    pub fn start(&mut self) {
        info!(bounds = %self.config.world_bounds, "balancer starting");
        self.update_fleet();
    }

    /// Apply one transport notification.
    pub fn handle(&mut self, op: WorldOp) -> Flow {
        trace!(msg_type = op.msg_type(), "handling op");
        match op {
            WorldOp::AddEntity { entity } => self.on_add_entity(entity),
            WorldOp::RemoveEntity { entity } => self.on_remove_entity(entity),
            WorldOp::AddComponent { entity, data } | WorldOp::ComponentUpdate { entity, data } => {
                match self.components.decode(&data) {
                    Ok(value) => self.on_component(entity, value),
                    Err(ComponentError::UnknownComponent(component)) => {
                        trace!(%entity, %component, "ignoring component");
                    }
                    Err(e) => warn!(%entity, error = %e, "undecodable component"),
                }
            }
            WorldOp::RemoveComponent {
                entity,
                component_type,
            } => self.on_remove_component(entity, component_type),
            WorldOp::AuthorityChange {
                entity,
                component_type,
                authority,
            } => self.on_authority_change(entity, component_type, authority),
            WorldOp::CreateEntity { request_id, entity } => {
                self.on_entity_created(request_id, entity);
            }
            WorldOp::DeleteEntity { entity } => debug!(%entity, "entity deletion acknowledged"),
            WorldOp::FlagUpdate { key, value } => {
                self.fleet
                    .on_flag_update(&key, value.as_deref(), &mut self.host);
            }
            WorldOp::CommandRejected {
                entity,
                component_type,
                reason,
            } => {
                warn!(%entity, component = %component_type, %reason, "write rejected");
                if let Some(tracked) = self.entities.get_mut(entity) {
                    tracked.invalidate();
                }
            }
            WorldOp::Disconnect { reason } => {
                warn!(%reason, "disconnected from transport");
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    /// Apply the completion of a supervised process.
    pub fn handle_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Exited {
                pid,
                class,
                code,
                requested,
            } => {
                self.host.release(pid);
                let crashed = match class {
                    ProcessClass::Bot => self.fleet.bot_exited(pid),
                    ProcessClass::Simulation => !requested,
                };
                if crashed {
                    warn!(%pid, %class, ?code, "process exited unexpectedly");
                } else {
                    info!(%pid, %class, "process stopped");
                }
            }
            ProcessEvent::StopFailed { pid, class, error } => {
                error!(%pid, %class, %error, "failed to stop process");
                let Some(worker) = self.roster.by_process_mut(pid) else {
                    return;
                };
                worker.being_shut_down = false;
                if self.grid_formed {
                    self.maybe_rebalance();
                }
            }
        }
    }

    /// Re-check every tracked entity. Returns how many changed worker.
    pub fn reconcile_all(&mut self) -> usize {
        self.entities
            .ids()
            .into_iter()
            .filter(|id| {
                matches!(
                    self.reconcile(*id),
                    Some(Reconciliation::Reassigned { .. })
                )
            })
            .count()
    }

    fn reconcile(&mut self, entity: EntityId) -> Option<Reconciliation> {
        let tracked = self.entities.get_mut(entity)?;
        let reconciler = Reconciler {
            roster: &self.roster,
            spatial_components: &self.config.spatial_components,
            acl_authority: &self.acl_authority,
        };
        Some(reconciler.reconcile(tracked, &mut self.outbox))
    }

    /// Step the fleet towards its target. A worker asked to stop gives up
    /// its cell at once; returns `true` if that recomputed the grid.
    fn update_fleet(&mut self) -> bool {
        let live = self.roster.live_count();
        self.fleet
            .update_worker_processes(self.clients.len(), &mut self.roster, &mut self.host);
        if self.grid_formed && self.roster.live_count() < live {
            self.maybe_rebalance();
            return true;
        }
        false
    }

    /// Recompute the grid once the fleet first reaches its target, and on
    /// every roster change after that.
    fn maybe_rebalance(&mut self) {
        if !self.grid_formed && self.roster.live_count() < self.fleet.target_workers() {
            debug!(
                workers = self.roster.live_count(),
                target = self.fleet.target_workers(),
                "waiting for workers before partitioning"
            );
            return;
        }
        self.grid_formed = true;
        let cells = reconciler::rebalance(
            &mut self.roster,
            &self.config.world_bounds,
            self.config.interest_margin,
            self.config.interest_height,
            &mut self.outbox,
        );
        let moved = self.reconcile_all();
        info!(workers = self.roster.len(), cells, moved, "rebalanced authority");
    }

    fn on_add_entity(&mut self, entity: EntityId) {
        if self.entities.contains(entity) {
            debug!(%entity, "entity already tracked");
            return;
        }
        self.entities.track(entity);
        debug!(%entity, "tracking entity");
    }

    fn on_remove_entity(&mut self, entity: EntityId) {
        self.acl_authority.remove(&entity);
        if self.clients.contains_key(&entity) || self.roster.contains_identity(entity) {
            self.worker_departed(entity);
        }

        let Some(removed) = self.entities.remove(entity) else {
            debug!(%entity, "removed entity was not tracked");
            return;
        };
        debug!(%entity, "stopped tracking entity");

        if let Some(client_id) = removed.client
            && self.config.respawn_ships
            && self.client_connected(&client_id)
        {
            info!(%entity, %client_id, "respawning ship");
            self.spawn_ship(&client_id);
        }
    }

    fn on_component(&mut self, entity: EntityId, value: ComponentValue) {
        match value {
            ComponentValue::Worker(identity) => self.on_worker_identity(entity, identity),
            ComponentValue::Acl(acl) => {
                let Some(tracked) = self.entities.get_mut(entity) else {
                    debug!(%entity, "ACL for untracked entity");
                    return;
                };
                tracked.acl = Some(acl);
                self.reconcile(entity);
            }
            ComponentValue::Position(position) => {
                let Some(tracked) = self.entities.get_mut(entity) else {
                    debug!(%entity, "position for untracked entity");
                    return;
                };
                tracked.position = Some(position);
                self.reconcile(entity);
            }
            _ => {}
        }
    }

    fn on_remove_component(&mut self, entity: EntityId, component: ComponentTypeId) {
        if component == ids::WORKER {
            self.worker_departed(entity);
        } else if component == ids::ACL
            && let Some(tracked) = self.entities.get_mut(entity)
        {
            tracked.acl = None;
            tracked.invalidate();
        }
    }

    fn on_authority_change(
        &mut self,
        entity: EntityId,
        component: ComponentTypeId,
        authority: Authority,
    ) {
        if component != ids::ACL {
            return;
        }
        if authority.is_authoritative() {
            if self.acl_authority.insert(entity) {
                debug!(%entity, "gained ACL authority");
                self.reconcile(entity);
            }
        } else if self.acl_authority.remove(&entity) {
            debug!(%entity, "lost ACL authority");
        }
    }

    fn on_worker_identity(&mut self, entity: EntityId, identity: WorkerIdentity) {
        let role = identity.role();
        let worker_id = identity.worker_id;
        match role {
            WorkerRole::Server => {
                if self.roster.contains_identity(entity) || self.anchor_pending_for(entity) {
                    debug!(%entity, %worker_id, "simulation worker already known");
                    return;
                }
                info!(%entity, %worker_id, "simulation worker connected");
                if let Some(request) = self.outbox.create(shapes::worker_anchor()) {
                    self.pending.insert(
                        request,
                        PendingCreate::WorkerAnchor {
                            worker_id,
                            identity_entity: entity,
                        },
                    );
                }
            }
            role if role.is_client() => {
                if self.clients.contains_key(&entity) {
                    debug!(%entity, %worker_id, "client already known");
                    return;
                }
                info!(%entity, %worker_id, %role, "client connected");
                self.clients.insert(
                    entity,
                    ClientRecord {
                        worker_id: worker_id.clone(),
                        role,
                    },
                );
                self.update_fleet();
                self.spawn_ship(&worker_id);
            }
            other => debug!(%entity, %worker_id, role = %other, "ignoring worker"),
        }
    }

    fn anchor_pending_for(&self, identity: EntityId) -> bool {
        self.pending.values().any(|p| p.is_anchor_for(identity))
    }

    fn client_connected(&self, client_id: &str) -> bool {
        self.clients.values().any(|c| c.worker_id == client_id)
    }

    fn on_entity_created(&mut self, request: RequestId, entity: Option<EntityId>) {
        let Some(pending) = self.pending.remove(&request) else {
            debug!(%request, "acknowledgement for unknown request");
            return;
        };
        let Some(entity) = entity else {
            self.creation_failed(request, pending);
            return;
        };

        match pending {
            PendingCreate::WorkerAnchor {
                worker_id,
                identity_entity,
            } => self.register_worker(worker_id, identity_entity, entity),
            PendingCreate::ClientShip {
                client_id,
                acl,
                spawn,
            } => {
                if !self.client_connected(&client_id) {
                    info!(%entity, %client_id, "client left before its ship arrived");
                    self.outbox.delete(entity);
                    return;
                }
                let ship = self.entities.track(entity);
                ship.client = Some(client_id.clone());
                if ship.acl.is_none() {
                    ship.acl = Some(acl);
                }
                if ship.position.is_none() {
                    ship.position = Some(Position::from_planar(spawn));
                }
                info!(%entity, %client_id, %spawn, "ship created");
                self.outbox.update(entity, shapes::ship_interest(entity));
                self.reconcile(entity);
            }
            PendingCreate::Abandoned => {
                debug!(%entity, "deleting anchor of departed worker");
                self.outbox.delete(entity);
            }
        }
    }

    fn creation_failed(&mut self, request: RequestId, pending: PendingCreate) {
        match pending {
            PendingCreate::WorkerAnchor {
                worker_id,
                identity_entity,
            } => {
                warn!(%request, %worker_id, "anchor creation failed; retrying");
                if let Some(retry) = self.outbox.create(shapes::worker_anchor()) {
                    self.pending.insert(
                        retry,
                        PendingCreate::WorkerAnchor {
                            worker_id,
                            identity_entity,
                        },
                    );
                }
            }
            PendingCreate::ClientShip { client_id, .. } => {
                if self.client_connected(&client_id) {
                    warn!(%request, %client_id, "ship creation failed; retrying");
                    self.spawn_ship(&client_id);
                }
            }
            PendingCreate::Abandoned => {
                debug!(%request, "anchor creation for departed worker failed");
            }
        }
    }

    fn register_worker(&mut self, worker_id: String, identity: EntityId, anchor: EntityId) {
        let mut record = WorkerRecord::new(worker_id.clone(), identity, anchor);
        record.process = self.host.resolve(&worker_id);
        if record.process.is_none() {
            warn!(%worker_id, "no process handle for worker");
        }
        let index = self.roster.register(record);
        info!(%worker_id, index, %anchor, "registered simulation worker");

        self.fleet.worker_registered();
        if !self.update_fleet() {
            self.maybe_rebalance();
        }
    }

    fn worker_departed(&mut self, identity: EntityId) {
        for pending in self.pending.values_mut() {
            if pending.is_anchor_for(identity) {
                *pending = PendingCreate::Abandoned;
            }
        }

        if let Some(client) = self.clients.remove(&identity) {
            info!(worker_id = %client.worker_id, "client disconnected");
            self.delete_owned_by(&client.worker_id);
            self.update_fleet();
        }

        if let Some(worker) = self.roster.remove_by_identity(identity) {
            info!(
                worker_id = %worker.worker_id,
                anchor = %worker.anchor,
                "simulation worker disconnected"
            );
            self.outbox.delete(worker.anchor);
            self.entities.remove(worker.anchor);
            self.delete_owned_by(&worker.worker_id);
            if !self.update_fleet() {
                self.maybe_rebalance();
            }
        }
    }

    fn delete_owned_by(&mut self, worker_id: &str) {
        for entity in self.entities.owned_by(worker_id) {
            info!(%entity, worker_id, "deleting entity of departed worker");
            self.outbox.delete(entity);
        }
    }

    fn spawn_ship(&mut self, client_id: &str) {
        let spawn = random_point(&self.config.world_bounds);
        let Some(request) = self.outbox.create(shapes::client_ship(client_id, spawn)) else {
            return;
        };
        self.pending.insert(
            request,
            PendingCreate::ClientShip {
                client_id: client_id.to_string(),
                acl: shapes::ship_acl(client_id),
                spawn,
            },
        );
    }
}

fn random_point(bounds: &Aabb) -> DVec2 {
    let mut rng = rand::thread_rng();
    let t = DVec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
    bounds.min + bounds.size() * t
}

#[cfg(test)]
mod tests {
    use spatial_component::{Component, ComponentData, WorkerRequirementSet, worker_attribute};

    use super::*;
    use crate::fleet::FleetState;
    use crate::process::testing::RecordingHost;
    use crate::process::ProcessId;

    fn coordinator() -> Coordinator<RecordingHost> {
        Coordinator::new(BalancerConfig::default(), RecordingHost::new())
    }

    fn data<T: Component>(value: &T) -> ComponentData {
        value.to_data().unwrap()
    }

    fn identity(entity: u64, worker_id: &str, worker_type: &str) -> WorldOp {
        WorldOp::AddComponent {
            entity: EntityId(entity),
            data: data(&WorkerIdentity::new(worker_id, worker_type)),
        }
    }

    fn position(entity: EntityId, x: f64, y: f64) -> WorldOp {
        WorldOp::ComponentUpdate {
            entity,
            data: data(&Position::from_planar(DVec2::new(x, y))),
        }
    }

    fn grant_acl(entity: EntityId) -> WorldOp {
        WorldOp::AuthorityChange {
            entity,
            component_type: ids::ACL,
            authority: Authority::Authoritative,
        }
    }

    fn last_create(c: &Coordinator<RecordingHost>) -> RequestId {
        c.outbox()
            .commands()
            .iter()
            .rev()
            .find_map(|cmd| match cmd {
                WorldCommand::CreateEntity { request_id, .. } => Some(*request_id),
                _ => None,
            })
            .unwrap()
    }

    fn ack(c: &mut Coordinator<RecordingHost>, request_id: RequestId, entity: EntityId) {
        c.handle(WorldOp::CreateEntity {
            request_id,
            entity: Some(entity),
        });
    }

    /// Connect the simulation worker behind `pid` and acknowledge its anchor.
    fn connect_server(
        c: &mut Coordinator<RecordingHost>,
        identity_entity: u64,
        pid: ProcessId,
    ) -> EntityId {
        c.handle(identity(identity_entity, &format!("Server_{pid}"), "Server"));
        let anchor = EntityId(identity_entity + 500);
        let request_id = last_create(c);
        ack(c, request_id, anchor);
        anchor
    }

    /// Connect a client and acknowledge its ship.
    fn connect_client(c: &mut Coordinator<RecordingHost>, identity_entity: u64, ship: EntityId) {
        c.handle(identity(identity_entity, &format!("Client_{identity_entity}"), "LauncherClient"));
        let request_id = last_create(c);
        ack(c, request_id, ship);
    }

    /// Start the balancer and bring up the four workers five clients need.
    fn four_worker_world() -> Coordinator<RecordingHost> {
        let mut c = coordinator();
        c.start();
        for n in 0..5 {
            connect_client(&mut c, 10 + n, EntityId(200 + n));
        }
        for n in 0..4 {
            let pid = *c.host().spawned_of(ProcessClass::Simulation).last().unwrap();
            connect_server(&mut c, 1 + n, pid);
        }
        c
    }

    fn deleted(commands: &[WorldCommand]) -> Vec<EntityId> {
        commands
            .iter()
            .filter_map(|cmd| match cmd {
                WorldCommand::DeleteEntity { entity } => Some(*entity),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_requests_first_worker() {
        let mut c = coordinator();
        c.start();
        assert_eq!(c.host().spawned_of(ProcessClass::Simulation).len(), 1);
        assert_eq!(c.fleet().state(), FleetState::Adjusting);
    }

    #[test]
    fn test_single_worker_gets_whole_world() {
        let mut c = coordinator();
        c.start();
        let pid = c.host().spawned_of(ProcessClass::Simulation)[0];
        let anchor = connect_server(&mut c, 1, pid);

        let worker = c.roster().get(0).unwrap();
        assert_eq!(worker.anchor, anchor);
        assert_eq!(worker.process, Some(pid));
        assert_eq!(worker.cell, Some(c.config().world_bounds));
        assert_eq!(c.fleet().state(), FleetState::Idle);
    }

    #[test]
    fn test_five_clients_partition_into_quadrants() {
        let c = four_worker_world();
        assert_eq!(c.client_count(), 5);
        assert_eq!(c.roster().len(), 4);
        assert_eq!(c.host().spawned_of(ProcessClass::Simulation).len(), 4);

        let cells: Vec<Aabb> = c.roster().iter().filter_map(|w| w.cell).collect();
        assert_eq!(
            cells,
            vec![
                Aabb::from_corners(0.0, 0.0, 1024.0, 512.0),
                Aabb::from_corners(1024.0, 0.0, 2048.0, 512.0),
                Aabb::from_corners(0.0, 512.0, 1024.0, 1024.0),
                Aabb::from_corners(1024.0, 512.0, 2048.0, 1024.0),
            ]
        );
    }

    #[test]
    fn test_no_partition_before_target_reached() {
        let mut c = coordinator();
        c.start();
        for n in 0..5 {
            connect_client(&mut c, 10 + n, EntityId(200 + n));
        }
        let pid = c.host().spawned_of(ProcessClass::Simulation)[0];
        connect_server(&mut c, 1, pid);
        assert!(c.roster().get(0).unwrap().cell.is_none());
    }

    #[test]
    fn test_ship_follows_position_across_cells() {
        let mut c = four_worker_world();
        let ship = EntityId(200);

        c.handle(position(ship, 1500.0, 300.0));
        assert_eq!(c.entities().get(ship).unwrap().assignment, None);

        c.handle(grant_acl(ship));
        let tracked = c.entities().get(ship).unwrap();
        assert_eq!(tracked.assignment, Some(1));
        let server_1 = c.roster().get(1).unwrap().worker_id.clone();
        assert!(tracked.acl.as_ref().unwrap().can_write(ids::SHIP, &[worker_attribute(&server_1)]));

        c.drain_commands();
        c.handle(position(ship, 500.0, 700.0));
        let tracked = c.entities().get(ship).unwrap();
        assert_eq!(tracked.assignment, Some(2));
        let server_2 = c.roster().get(2).unwrap();
        assert_eq!(server_2.cell, Some(Aabb::from_corners(0.0, 512.0, 1024.0, 1024.0)));
        let acl = tracked.acl.as_ref().unwrap();
        assert!(acl.can_write(ids::POSITION, &[worker_attribute(&server_2.worker_id)]));
        assert!(!acl.can_write(ids::POSITION, &[worker_attribute(&server_1)]));
        assert_eq!(c.drain_commands().len(), 2);

        c.handle(position(ship, 510.0, 710.0));
        assert!(c.outbox().is_empty());
    }

    #[test]
    fn test_rejected_write_is_retried() {
        let mut c = four_worker_world();
        let ship = EntityId(200);
        c.handle(grant_acl(ship));
        c.handle(position(ship, 100.0, 100.0));
        c.drain_commands();

        c.handle(WorldOp::CommandRejected {
            entity: ship,
            component_type: ids::ACL,
            reason: "not authoritative".to_string(),
        });
        assert_eq!(c.entities().get(ship).unwrap().assignment, None);
        c.handle(position(ship, 101.0, 100.0));
        assert_eq!(c.entities().get(ship).unwrap().assignment, Some(0));
        assert_eq!(c.drain_commands().len(), 2);
    }

    #[test]
    fn test_departed_worker_takes_exclusive_entities() {
        let mut c = four_worker_world();
        let departing = c.roster().get(3).unwrap().clone();

        for n in 0..3 {
            let entity = EntityId(300 + n);
            c.handle(WorldOp::AddEntity { entity });
            let acl = EntityAcl::new(WorkerRequirementSet::single("position"))
                .with_writer(ids::BULLET, WorkerRequirementSet::worker(&departing.worker_id));
            c.handle(WorldOp::AddComponent {
                entity,
                data: data(&acl),
            });
        }
        c.drain_commands();

        c.handle(WorldOp::RemoveComponent {
            entity: departing.identity_entity,
            component_type: ids::WORKER,
        });
        let commands = c.drain_commands();
        let mut gone = deleted(&commands);
        gone.sort_unstable();
        assert_eq!(
            gone,
            vec![EntityId(300), EntityId(301), EntityId(302), departing.anchor]
        );
        assert_eq!(c.roster().len(), 3);
        assert!(c.roster().index_of(&departing.worker_id).is_none());
    }

    #[test]
    fn test_client_disconnect_deletes_ship_without_respawn() {
        let mut c = four_worker_world();
        c.drain_commands();

        c.handle(WorldOp::RemoveComponent {
            entity: EntityId(10),
            component_type: ids::WORKER,
        });
        assert_eq!(deleted(&c.drain_commands()), vec![EntityId(200)]);

        c.handle(WorldOp::RemoveEntity {
            entity: EntityId(200),
        });
        assert!(c.entities().get(EntityId(200)).is_none());
        assert!(c.drain_commands().is_empty());
    }

    #[test]
    fn test_lost_ship_respawns_for_connected_client() {
        let mut c = four_worker_world();
        c.drain_commands();

        c.handle(WorldOp::RemoveEntity {
            entity: EntityId(201),
        });
        let commands = c.drain_commands();
        assert_eq!(commands.len(), 1);
        let request_id = match &commands[0] {
            WorldCommand::CreateEntity { request_id, .. } => *request_id,
            other => panic!("unexpected command {other:?}"),
        };
        ack(&mut c, request_id, EntityId(250));
        assert_eq!(
            c.entities().get(EntityId(250)).unwrap().client.as_deref(),
            Some("Client_11")
        );
    }

    #[test]
    fn test_anchor_of_departed_worker_is_deleted_on_ack() {
        let mut c = coordinator();
        c.start();
        c.handle(identity(1, "Server_1000", "Server"));
        let request_id = last_create(&c);
        c.handle(WorldOp::RemoveComponent {
            entity: EntityId(1),
            component_type: ids::WORKER,
        });
        c.drain_commands();

        ack(&mut c, request_id, EntityId(501));
        assert!(c.roster().is_empty());
        assert_eq!(deleted(&c.drain_commands()), vec![EntityId(501)]);
    }

    #[test]
    fn test_duplicate_identity_is_ignored() {
        let mut c = coordinator();
        c.handle(identity(1, "Server_1000", "Server"));
        c.handle(identity(1, "Server_1000", "Server"));
        let creates = c
            .outbox()
            .commands()
            .iter()
            .filter(|cmd| matches!(cmd, WorldCommand::CreateEntity { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[test]
    fn test_unknown_components_and_acks_are_harmless() {
        let mut c = coordinator();
        let flow = c.handle(WorldOp::AddComponent {
            entity: EntityId(9),
            data: ComponentData {
                component_type: ids::BULLET,
                payload: vec![0xc0],
            },
        });
        assert_eq!(flow, Flow::Continue);
        c.handle(WorldOp::CreateEntity {
            request_id: RequestId(99),
            entity: Some(EntityId(9)),
        });
        c.handle(position(EntityId(9), 1.0, 1.0));
        assert!(c.outbox().is_empty());
        assert!(c.entities().is_empty());
    }

    #[test]
    fn test_disconnect_stops_loop() {
        let mut c = coordinator();
        let flow = c.handle(WorldOp::Disconnect {
            reason: "shutdown".to_string(),
        });
        assert_eq!(flow, Flow::Shutdown);
    }

    #[test]
    fn test_bot_flag_and_crash() {
        let mut c = coordinator();
        c.handle(WorldOp::FlagUpdate {
            key: "NUM_BOTS".to_string(),
            value: Some("2".to_string()),
        });
        let bots = c.host().spawned_of(ProcessClass::Bot);
        assert_eq!(bots.len(), 2);

        c.handle_process_event(ProcessEvent::Exited {
            pid: bots[0],
            class: ProcessClass::Bot,
            code: Some(1),
            requested: false,
        });
        assert_eq!(c.fleet().bots().len(), 1);
        assert!(!c.host().knows(bots[0]));
    }

    #[test]
    fn test_failed_stop_returns_worker_to_service() {
        let mut c = four_worker_world();
        // Three clients need a single worker: the oldest of four is stopped.
        for n in 0..2 {
            c.handle(WorldOp::RemoveComponent {
                entity: EntityId(10 + n),
                component_type: ids::WORKER,
            });
        }
        let victim = c.roster().get(0).unwrap().clone();
        assert!(victim.being_shut_down);
        assert!(victim.cell.is_none());
        assert_eq!(c.host().stopped, vec![victim.process.unwrap()]);

        c.handle_process_event(ProcessEvent::StopFailed {
            pid: victim.process.unwrap(),
            class: ProcessClass::Simulation,
            error: "permission denied".to_string(),
        });
        assert!(!c.roster().get(0).unwrap().being_shut_down);
        assert_eq!(
            c.roster().get(0).unwrap().cell,
            Some(Aabb::from_corners(0.0, 0.0, 1024.0, 512.0))
        );
    }

    fn assert_stopping_workers_hold_nothing(c: &Coordinator<RecordingHost>) {
        for worker in c.roster().iter().filter(|w| w.being_shut_down) {
            assert!(worker.cell.is_none(), "{} is stopping but holds a cell", worker.worker_id);
            assert!(
                c.entities()
                    .iter()
                    .all(|e| e.owner.as_deref() != Some(worker.worker_id.as_str())),
                "{} is stopping but owns entities",
                worker.worker_id
            );
        }
    }

    #[test]
    fn test_scale_down_hands_cells_to_live_workers() {
        let mut c = four_worker_world();
        for n in 2..5 {
            let ship = EntityId(200 + n);
            c.handle(grant_acl(ship));
            c.handle(position(ship, 300.0 * n as f64, 150.0 * n as f64));
        }
        let bullet = EntityId(300);
        c.handle(WorldOp::AddEntity { entity: bullet });
        let acl = EntityAcl::new(WorkerRequirementSet::single("position"))
            .with_writer(ids::BULLET, WorkerRequirementSet::single("position"))
            .with_writer(ids::POSITION, WorkerRequirementSet::single("position"));
        c.handle(WorldOp::AddComponent {
            entity: bullet,
            data: data(&acl),
        });
        c.handle(grant_acl(bullet));
        c.handle(position(bullet, 1800.0, 900.0));
        assert_eq!(c.entities().get(bullet).unwrap().assignment, Some(3));

        // Five clients drop to three: one worker is enough.
        for n in 0..2 {
            c.handle(WorldOp::RemoveComponent {
                entity: EntityId(10 + n),
                component_type: ids::WORKER,
            });
        }
        let victim = c.roster().get(0).unwrap().clone();
        assert!(victim.being_shut_down);
        assert_stopping_workers_hold_nothing(&c);
        assert_eq!(c.roster().get(1).unwrap().cell, Some(c.config().world_bounds));
        c.drain_commands();

        c.handle(WorldOp::RemoveComponent {
            entity: victim.identity_entity,
            component_type: ids::WORKER,
        });
        let gone = deleted(&c.drain_commands());
        assert_eq!(gone, vec![victim.anchor]);
        assert!(c.roster().get(0).unwrap().being_shut_down);
        assert_stopping_workers_hold_nothing(&c);

        let holders: Vec<&str> = c
            .roster()
            .iter()
            .filter(|w| w.cell.is_some())
            .map(|w| w.worker_id.as_str())
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(c.entities().get(bullet).unwrap().owner.as_deref(), Some(holders[0]));
    }

    #[test]
    fn test_failed_anchor_creation_is_retried() {
        let mut c = coordinator();
        c.start();
        c.handle(identity(1, "Server_1000", "Server"));
        let first = last_create(&c);
        c.handle(WorldOp::CreateEntity {
            request_id: first,
            entity: None,
        });
        let retry = last_create(&c);
        assert_ne!(retry, first);
        assert!(c.roster().is_empty());

        ack(&mut c, retry, EntityId(501));
        assert_eq!(c.roster().get(0).unwrap().anchor, EntityId(501));
        assert_eq!(c.fleet().state(), FleetState::Idle);
    }

    #[test]
    fn test_failed_ship_creation_is_retried() {
        let mut c = coordinator();
        c.handle(identity(10, "Client_10", "LauncherClient"));
        let first = last_create(&c);
        c.handle(WorldOp::CreateEntity {
            request_id: first,
            entity: None,
        });
        let retry = last_create(&c);
        assert_ne!(retry, first);

        ack(&mut c, retry, EntityId(200));
        assert_eq!(
            c.entities().get(EntityId(200)).unwrap().client.as_deref(),
            Some("Client_10")
        );
    }

    #[test]
    fn test_sweep_converges_after_churn() {
        let mut c = four_worker_world();
        for n in 0..5 {
            let ship = EntityId(200 + n);
            c.handle(grant_acl(ship));
            c.handle(position(ship, 150.0 + 400.0 * n as f64, 100.0 + 200.0 * n as f64));
        }

        let leaving = c.roster().get(1).unwrap().identity_entity;
        c.handle(WorldOp::RemoveComponent {
            entity: leaving,
            component_type: ids::WORKER,
        });
        let pid = *c.host().spawned_of(ProcessClass::Simulation).last().unwrap();
        connect_server(&mut c, 40, pid);
        assert_eq!(c.roster().len(), 4);

        c.drain_commands();
        assert_eq!(c.reconcile_all(), 0);
        assert!(c.outbox().is_empty());
        for ship in c.entities().iter().filter(|e| e.client.is_some()) {
            let worker = c.roster().get(ship.assignment.unwrap()).unwrap();
            assert!(worker.covers(ship.position.unwrap().planar()));
            assert_eq!(ship.owner.as_deref(), Some(worker.worker_id.as_str()));
        }
    }
}
