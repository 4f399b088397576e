//! Moving write authority with entity position.
//!
//! Each tracked entity is assigned to the worker whose cell contains its
//! planar position. An assignment rewrites every spatial component the
//! entity's ACL declares so that only that worker may write it.

use std::collections::HashSet;

use spatial_component::{
    ComponentTypeId, EntityAcl, EntityId, WorkerAssignment, WorkerRequirementSet,
};
use spatial_math::Aabb;
use tracing::{debug, info, warn};

use crate::entities::TrackedEntity;
use crate::grid::PartitionGrid;
use crate::outbox::Outbox;
use crate::roster::WorkerRoster;
use crate::shapes::WorkerRegion;

/// Result of reconciling one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Already with the right worker; nothing written.
    Unchanged,
    /// Handed to the worker at index `to`.
    Reassigned { from: Option<usize>, to: usize },
    /// No cell contains the position; the old assignment stands.
    Uncontained,
    /// Not eligible right now.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    WorkerAnchor,
    NoPosition,
    NoAcl,
    /// The balancer does not hold write authority over the entity's ACL.
    NoAuthority,
}

pub struct Reconciler<'a> {
    pub roster: &'a WorkerRoster,
    pub spatial_components: &'a [ComponentTypeId],
    /// Entities whose ACL the balancer may currently write.
    pub acl_authority: &'a HashSet<EntityId>,
}

impl Reconciler<'_> {
    /// Returns `true` if every spatial component `acl` declares is writable
    /// by `worker_id` alone.
    fn writes_point_at(&self, acl: &EntityAcl, worker_id: &str) -> bool {
        let wanted = WorkerRequirementSet::worker(worker_id);
        self.spatial_components
            .iter()
            .filter_map(|component| acl.writer(*component))
            .all(|requirement| *requirement == wanted)
    }

    pub fn reconcile(&self, entity: &mut TrackedEntity, outbox: &mut Outbox) -> Reconciliation {
        if self.roster.is_anchor(entity.id) {
            return Reconciliation::Skipped(SkipReason::WorkerAnchor);
        }
        let Some(position) = entity.position else {
            return Reconciliation::Skipped(SkipReason::NoPosition);
        };
        if entity.acl.is_none() {
            return Reconciliation::Skipped(SkipReason::NoAcl);
        }
        let point = position.planar();

        if let Some(index) = entity.assignment
            && let Some(worker) = self.roster.get(index)
            && worker.covers(point)
            && entity.owner.as_deref() == Some(worker.worker_id.as_str())
            && entity
                .acl
                .as_ref()
                .is_some_and(|acl| self.writes_point_at(acl, &worker.worker_id))
        {
            return Reconciliation::Unchanged;
        }

        let mut covering = self.roster.covering(point);
        let Some(index) = covering.next() else {
            if self.roster.iter().any(|w| w.cell.is_some()) {
                warn!(entity = %entity.id, %point, "position outside every cell");
            }
            return Reconciliation::Uncontained;
        };
        if let Some(other) = covering.next() {
            warn!(entity = %entity.id, %point, first = index, other, "overlapping cells");
        }

        if !self.acl_authority.contains(&entity.id) {
            debug!(entity = %entity.id, "no authority over ACL yet");
            return Reconciliation::Skipped(SkipReason::NoAuthority);
        }

        let Some(worker) = self.roster.get(index) else {
            return Reconciliation::Uncontained;
        };
        let Some(acl) = entity.acl.as_mut() else {
            return Reconciliation::Skipped(SkipReason::NoAcl);
        };
        acl.reassign(
            self.spatial_components,
            &WorkerRequirementSet::worker(&worker.worker_id),
        );

        let from = entity.assignment;
        entity.assignment = Some(index);
        entity.owner = Some(worker.worker_id.clone());
        outbox.update(entity.id, WorkerAssignment::from_index(Some(index)));
        outbox.update(entity.id, acl.clone());

        info!(
            entity = %entity.id,
            worker_id = %worker.worker_id,
            index,
            %point,
            "moved entity authority"
        );
        Reconciliation::Reassigned { from, to: index }
    }
}

/// Recompute the grid over the live workers and push each worker's region
/// to its anchor. Returns the number of cells.
pub fn rebalance(
    roster: &mut WorkerRoster,
    bounds: &Aabb,
    margin: f64,
    height: f64,
    outbox: &mut Outbox,
) -> usize {
    let live = roster.live_count();
    let grid = PartitionGrid::new(bounds, live);
    roster.apply_grid(&grid);

    let idle = grid.unassigned_workers(live);
    if idle > 0 {
        warn!(workers = live, cells = grid.len(), idle, "workers left without a cell");
    }

    for (index, worker) in roster.iter().enumerate() {
        let Some(cell) = worker.cell else {
            continue;
        };
        info!(
            worker_id = %worker.worker_id,
            index,
            cell = %cell,
            "assigning region"
        );
        for update in WorkerRegion::for_cell(&cell, margin, height).into_updates() {
            outbox.update(worker.anchor, update);
        }
    }
    grid.len()
}
