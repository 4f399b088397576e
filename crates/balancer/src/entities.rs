//! The balancer's view of the entities it may need to re-home.

use std::collections::HashMap;

use spatial_component::{EntityAcl, EntityId, Position};

/// What the balancer knows about one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub id: EntityId,
    /// Last access descriptor seen or written.
    pub acl: Option<EntityAcl>,
    /// Last position seen. Entities without one are never assigned.
    pub position: Option<Position>,
    /// Roster index of the worker the entity was last assigned to.
    pub assignment: Option<usize>,
    /// Id of that worker, kept because roster indices shift.
    pub owner: Option<String>,
    /// The client whose ship this is, for ships the balancer created.
    pub client: Option<String>,
}

impl TrackedEntity {
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            acl: None,
            position: None,
            assignment: None,
            owner: None,
            client: None,
        }
    }

    /// Forget the current assignment so the next reconciliation rewrites it.
    pub fn invalidate(&mut self) {
        self.assignment = None;
        self.owner = None;
    }

    /// Returns `true` if the entity must go when `worker_id` leaves: either
    /// it is that client's ship, or that worker is the only one named in
    /// its write requirements.
    #[must_use]
    pub fn is_owned_by(&self, worker_id: &str) -> bool {
        self.client.as_deref() == Some(worker_id)
            || self
                .acl
                .as_ref()
                .is_some_and(|acl| acl.is_exclusively_owned_by(worker_id))
    }
}

/// All entities the balancer has seen, keyed by id.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, TrackedEntity>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id`, or return the existing entry.
    pub fn track(&mut self, id: EntityId) -> &mut TrackedEntity {
        self.entities
            .entry(id)
            .or_insert_with(|| TrackedEntity::new(id))
    }

    pub fn remove(&mut self, id: EntityId) -> Option<TrackedEntity> {
        self.entities.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut TrackedEntity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// All tracked ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of the entities owned by `worker_id`, in ascending order.
    #[must_use]
    pub fn owned_by(&self, worker_id: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_owned_by(worker_id))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
