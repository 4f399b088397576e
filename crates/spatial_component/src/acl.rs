//! Access descriptors.
//!
//! An [`EntityAcl`] states which workers may read an entity and, per
//! component type, which workers may write it. Requirements are expressed
//! over worker attribute tags:
//!
//! ```text
//! WorkerRequirementSet = any of [ WorkerAttributeSet ]
//! WorkerAttributeSet   = all of [ attribute ]
//! ```
//!
//! A worker satisfies a requirement set when at least one of its attribute
//! sets is a subset of the worker's attributes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId, ids};

/// Attribute carried by the balancer itself.
pub const BALANCER_ATTRIBUTE: &str = "balancer";

/// Attribute carried by every simulation worker.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Attribute carried by every client worker.
pub const CLIENT_ATTRIBUTE: &str = "client";

/// Prefix of the per-worker identity attribute.
pub const WORKER_ID_PREFIX: &str = "workerId:";

/// The attribute that identifies exactly one worker: `workerId:<id>`.
#[must_use]
pub fn worker_attribute(worker_id: &str) -> String {
    format!("{WORKER_ID_PREFIX}{worker_id}")
}

/// Extract the worker id from a `workerId:<id>` attribute.
#[must_use]
pub fn worker_id_of(attribute: &str) -> Option<&str> {
    attribute.strip_prefix(WORKER_ID_PREFIX)
}

/// A conjunction of attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAttributeSet {
    pub attributes: Vec<String>,
}

impl WorkerAttributeSet {
    #[must_use]
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn single(attribute: impl Into<String>) -> Self {
        Self {
            attributes: vec![attribute.into()],
        }
    }

    /// Returns `true` if every attribute of this set is in `worker`.
    #[must_use]
    pub fn is_satisfied_by<S: AsRef<str>>(&self, worker: &[S]) -> bool {
        self.attributes
            .iter()
            .all(|required| worker.iter().any(|a| a.as_ref() == required))
    }
}

/// A disjunction of [`WorkerAttributeSet`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequirementSet {
    pub attribute_sets: Vec<WorkerAttributeSet>,
}

impl WorkerRequirementSet {
    /// A requirement satisfied only by workers carrying `attribute`.
    #[must_use]
    pub fn single(attribute: impl Into<String>) -> Self {
        Self {
            attribute_sets: vec![WorkerAttributeSet::single(attribute)],
        }
    }

    /// A requirement satisfied by any worker carrying one of `attributes`.
    #[must_use]
    pub fn any_of<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute_sets: attributes
                .into_iter()
                .map(WorkerAttributeSet::single)
                .collect(),
        }
    }

    /// A requirement satisfied only by the worker with this id.
    #[must_use]
    pub fn worker(worker_id: &str) -> Self {
        Self::single(worker_attribute(worker_id))
    }

    #[must_use]
    pub fn is_satisfied_by<S: AsRef<str>>(&self, worker: &[S]) -> bool {
        self.attribute_sets
            .iter()
            .any(|set| set.is_satisfied_by(worker))
    }

    /// Every worker id named by a `workerId:` attribute in this requirement.
    pub fn worker_ids(&self) -> impl Iterator<Item = &str> {
        self.attribute_sets
            .iter()
            .flat_map(|set| set.attributes.iter())
            .filter_map(|a| worker_id_of(a))
    }
}

/// The access descriptor of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAcl {
    /// Who may see the entity at all.
    pub read: WorkerRequirementSet,
    /// Who may write each component type.
    pub component_write: BTreeMap<ComponentTypeId, WorkerRequirementSet>,
}

impl EntityAcl {
    #[must_use]
    pub fn new(read: WorkerRequirementSet) -> Self {
        Self {
            read,
            component_write: BTreeMap::new(),
        }
    }

    /// Builder form of [`EntityAcl::set_writer`].
    #[must_use]
    pub fn with_writer(mut self, component: ComponentTypeId, requirement: WorkerRequirementSet) -> Self {
        self.set_writer(component, requirement);
        self
    }

    /// Set the write requirement for a component type, replacing any
    /// previous requirement.
    pub fn set_writer(&mut self, component: ComponentTypeId, requirement: WorkerRequirementSet) {
        self.component_write.insert(component, requirement);
    }

    /// The write requirement of a component type, if the entity declares one.
    #[must_use]
    pub fn writer(&self, component: ComponentTypeId) -> Option<&WorkerRequirementSet> {
        self.component_write.get(&component)
    }

    /// Point every listed component that this ACL already declares at
    /// `requirement`. Components the entity does not have are left alone.
    ///
    /// Returns the number of write requirements that changed.
    pub fn reassign(&mut self, components: &[ComponentTypeId], requirement: &WorkerRequirementSet) -> usize {
        let mut changed = 0;
        for component in components {
            if let Some(current) = self.component_write.get_mut(component)
                && current != requirement
            {
                *current = requirement.clone();
                changed += 1;
            }
        }
        changed
    }

    /// Returns `true` if a worker with `attributes` may write `component`.
    #[must_use]
    pub fn can_write<S: AsRef<str>>(&self, component: ComponentTypeId, attributes: &[S]) -> bool {
        self.component_write
            .get(&component)
            .is_some_and(|req| req.is_satisfied_by(attributes))
    }

    /// Distinct worker ids named anywhere in the write requirements.
    #[must_use]
    pub fn writer_worker_ids(&self) -> BTreeSet<&str> {
        self.component_write
            .values()
            .flat_map(WorkerRequirementSet::worker_ids)
            .collect()
    }

    /// Returns `true` if `worker_id` is the only worker named by id in the
    /// write requirements.
    #[must_use]
    pub fn is_exclusively_owned_by(&self, worker_id: &str) -> bool {
        let owners = self.writer_worker_ids();
        owners.len() == 1 && owners.contains(worker_id)
    }
}

impl Component for EntityAcl {
    const TYPE_ID: ComponentTypeId = ids::ACL;

    fn type_name() -> &'static str {
        "Acl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_attribute_roundtrip() {
        let attr = worker_attribute("Server_42");
        assert_eq!(attr, "workerId:Server_42");
        assert_eq!(worker_id_of(&attr), Some("Server_42"));
        assert_eq!(worker_id_of("balancer"), None);
    }

    #[test]
    fn test_attribute_set_is_conjunction() {
        let set = WorkerAttributeSet::new(["position", "gpu"]);
        assert!(set.is_satisfied_by(&["gpu", "position", "extra"]));
        assert!(!set.is_satisfied_by(&["position"]));
    }

    #[test]
    fn test_requirement_set_is_disjunction() {
        let req = WorkerRequirementSet::any_of(["position", "client"]);
        assert!(req.is_satisfied_by(&["client"]));
        assert!(req.is_satisfied_by(&["position"]));
        assert!(!req.is_satisfied_by(&["balancer"]));
    }

    #[test]
    fn test_empty_requirement_is_unsatisfiable() {
        let req = WorkerRequirementSet::default();
        assert!(!req.is_satisfied_by(&["balancer"]));
    }

    #[test]
    fn test_reassign_only_touches_declared_components() {
        let mut acl = EntityAcl::new(WorkerRequirementSet::single(POSITION_ATTRIBUTE))
            .with_writer(ids::POSITION, WorkerRequirementSet::single(POSITION_ATTRIBUTE))
            .with_writer(ids::SHIP, WorkerRequirementSet::single(POSITION_ATTRIBUTE))
            .with_writer(ids::PLAYER_INPUT, WorkerRequirementSet::worker("client-1"));

        let target = WorkerRequirementSet::worker("Server_7");
        let changed = acl.reassign(&[ids::POSITION, ids::SHIP, ids::BULLET], &target);

        assert_eq!(changed, 2);
        assert_eq!(acl.writer(ids::POSITION), Some(&target));
        assert_eq!(acl.writer(ids::SHIP), Some(&target));
        assert!(acl.writer(ids::BULLET).is_none());
        assert_eq!(
            acl.writer(ids::PLAYER_INPUT),
            Some(&WorkerRequirementSet::worker("client-1"))
        );

        // Second pass is a no-op.
        assert_eq!(acl.reassign(&[ids::POSITION, ids::SHIP], &target), 0);
    }

    #[test]
    fn test_exclusive_ownership() {
        let bullet = EntityAcl::default()
            .with_writer(ids::BULLET, WorkerRequirementSet::worker("Server_1"))
            .with_writer(ids::POSITION, WorkerRequirementSet::worker("Server_1"))
            .with_writer(ids::ACL, WorkerRequirementSet::single(BALANCER_ATTRIBUTE));
        assert!(bullet.is_exclusively_owned_by("Server_1"));
        assert!(!bullet.is_exclusively_owned_by("Server_2"));

        let ship = bullet
            .clone()
            .with_writer(ids::PLAYER_INPUT, WorkerRequirementSet::worker("client-1"));
        assert!(!ship.is_exclusively_owned_by("Server_1"));
        assert!(!ship.is_exclusively_owned_by("client-1"));
    }

    #[test]
    fn test_can_write() {
        let acl = EntityAcl::default().with_writer(ids::POSITION, WorkerRequirementSet::worker("Server_1"));
        assert!(acl.can_write(ids::POSITION, &["workerId:Server_1", "position"]));
        assert!(!acl.can_write(ids::POSITION, &["position"]));
        assert!(!acl.can_write(ids::SHIP, &["workerId:Server_1"]));
    }

    #[test]
    fn test_acl_json_shape() {
        let acl = EntityAcl::new(WorkerRequirementSet::single("balancer"))
            .with_writer(ids::POSITION, WorkerRequirementSet::single("balancer"));
        let json = serde_json::to_value(&acl).unwrap();
        assert_eq!(
            json["read"]["attribute_sets"][0]["attributes"][0],
            "balancer"
        );
        assert!(json["component_write"]["54"].is_object());
    }
}
