//! Query-based interest.
//!
//! An [`Interest`] maps a *trigger* component type to the queries a worker
//! runs while it is authoritative over that component. Each [`Query`] pairs
//! a [`Constraint`] with the component types to stream back for matching
//! entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId, ids};
use crate::constraint::Constraint;

/// One interest query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Which entities match.
    pub constraint: Constraint,
    /// Stream every component of matching entities instead of
    /// `result_components`.
    pub full_snapshot: Option<bool>,
    /// Component types to stream for matching entities.
    pub result_components: Vec<ComponentTypeId>,
    /// Maximum update frequency in Hz.
    pub frequency: Option<f32>,
}

impl Query {
    #[must_use]
    pub fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            full_snapshot: None,
            result_components: Vec::new(),
            frequency: None,
        }
    }

    #[must_use]
    pub fn returning(mut self, components: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        self.result_components.extend(components);
        self
    }

    #[must_use]
    pub fn full_snapshot(mut self, full: bool) -> Self {
        self.full_snapshot = Some(full);
        self
    }

    #[must_use]
    pub fn frequency(mut self, hz: f32) -> Self {
        self.frequency = Some(hz);
        self
    }
}

/// All queries attached to one trigger component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInterest {
    pub queries: Vec<Query>,
}

/// A worker's or entity's full interest declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub by_component: BTreeMap<ComponentTypeId, ComponentInterest>,
}

impl Interest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query under a trigger component.
    #[must_use]
    pub fn with_query(mut self, trigger: ComponentTypeId, query: Query) -> Self {
        self.by_component
            .entry(trigger)
            .or_default()
            .queries
            .push(query);
        self
    }

    /// Queries registered under a trigger component.
    #[must_use]
    pub fn queries(&self, trigger: ComponentTypeId) -> &[Query] {
        self.by_component
            .get(&trigger)
            .map(|ci| ci.queries.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_component.is_empty()
    }
}

impl Component for Interest {
    const TYPE_ID: ComponentTypeId = ids::INTEREST;

    fn type_name() -> &'static str {
        "Interest"
    }
}
