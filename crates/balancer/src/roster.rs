//! Worker roster: the simulation workers the balancer partitions over.
//!
//! A worker's index is its position in the roster. Indices shift down when
//! an earlier worker leaves, which is why the reconciler also remembers the
//! id of the worker it last assigned an entity to.

use spatial_component::EntityId;
use spatial_math::{Aabb, DVec2};

use crate::grid::PartitionGrid;
use crate::process::ProcessId;

/// One registered simulation worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRecord {
    /// The worker's id, as carried in `workerId:<id>` tags.
    pub worker_id: String,
    /// The entity carrying the worker's identity component.
    pub identity_entity: EntityId,
    /// The anchor entity the balancer created for this worker.
    pub anchor: EntityId,
    /// The region currently assigned to this worker.
    pub cell: Option<Aabb>,
    /// The OS process behind the worker, when the balancer launched it.
    pub process: Option<ProcessId>,
    /// Set once the fleet manager has asked the process to stop.
    pub being_shut_down: bool,
}

impl WorkerRecord {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, identity_entity: EntityId, anchor: EntityId) -> Self {
        Self {
            worker_id: worker_id.into(),
            identity_entity,
            anchor,
            cell: None,
            process: None,
            being_shut_down: false,
        }
    }

    /// Returns `true` if the worker's cell contains `point`.
    #[must_use]
    pub fn covers(&self, point: DVec2) -> bool {
        self.cell.is_some_and(|cell| cell.contains(point))
    }
}

/// Ordered list of registered simulation workers.
#[derive(Debug, Default)]
pub struct WorkerRoster {
    workers: Vec<WorkerRecord>,
}

impl WorkerRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a worker and return its index. A worker id that is already
    /// registered keeps its slot and the record is not replaced.
    pub fn register(&mut self, record: WorkerRecord) -> usize {
        if let Some(index) = self.index_of(&record.worker_id) {
            return index;
        }
        self.workers.push(record);
        self.workers.len() - 1
    }

    /// Remove the worker whose identity component lives on `entity`.
    pub fn remove_by_identity(&mut self, entity: EntityId) -> Option<WorkerRecord> {
        let index = self
            .workers
            .iter()
            .position(|w| w.identity_entity == entity)?;
        Some(self.workers.remove(index))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WorkerRecord> {
        self.workers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut WorkerRecord> {
        self.workers.get_mut(index)
    }

    #[must_use]
    pub fn index_of(&self, worker_id: &str) -> Option<usize> {
        self.workers.iter().position(|w| w.worker_id == worker_id)
    }

    #[must_use]
    pub fn contains_identity(&self, entity: EntityId) -> bool {
        self.workers.iter().any(|w| w.identity_entity == entity)
    }

    /// Returns `true` if `entity` is the anchor of a registered worker.
    #[must_use]
    pub fn is_anchor(&self, entity: EntityId) -> bool {
        self.workers.iter().any(|w| w.anchor == entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter()
    }

    /// Total number of registered workers, including those shutting down.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of workers not yet asked to stop.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.being_shut_down).count()
    }

    /// The oldest worker that has not been asked to stop.
    pub fn oldest_live_mut(&mut self) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| !w.being_shut_down)
    }

    /// The worker running as `process`.
    pub fn by_process_mut(&mut self, process: ProcessId) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.process == Some(process))
    }

    /// Store the cells of `grid`, built over the live workers in roster
    /// order. Workers being shut down and workers the grid does not reach
    /// lose their cell.
    pub fn apply_grid(&mut self, grid: &PartitionGrid) {
        for worker in &mut self.workers {
            worker.cell = None;
        }
        let mut live = self.workers.iter_mut().filter(|w| !w.being_shut_down);
        for cell in grid.cells() {
            let Some(worker) = live.next() else {
                break;
            };
            worker.cell = Some(cell.bounds);
        }
    }

    /// Indices of the workers whose cell contains `point`, in index order.
    pub fn covering(&self, point: DVec2) -> impl Iterator<Item = usize> + '_ {
        self.workers
            .iter()
            .enumerate()
            .filter(move |(_, w)| w.covers(point))
            .map(|(i, _)| i)
    }
}
