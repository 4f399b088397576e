//! # spatial_component
//!
//! The structured values the balancer reads from and writes to the
//! world-state transport.
//!
//! This crate provides:
//!
//! - [`EntityId`] / [`RequestId`]: transport entity ids and local request ids.
//! - [`Component`] trait and the [`ids`] catalogue of wire component types.
//! - [`EntityAcl`]: the access descriptor (read + per-component write
//!   requirements over worker attribute tags).
//! - [`Constraint`]: the interest constraint language.
//! - [`Interest`]: trigger component → queries.
//! - [`schema`]: payloads of the well-known component types.
//! - [`ComponentValue`] / [`ComponentRegistry`]: typed values and the
//!   type id → decoder registry.

pub mod acl;
pub mod component;
pub mod constraint;
pub mod entity;
pub mod error;
pub mod interest;
pub mod schema;
pub mod value;

pub use acl::{EntityAcl, WorkerAttributeSet, WorkerRequirementSet, worker_attribute};
pub use component::{Component, ComponentData, ComponentTypeId, ids};
pub use constraint::Constraint;
pub use entity::{EntityId, RequestId, RequestIdAllocator};
pub use error::ComponentError;
pub use interest::{ComponentInterest, Interest, Query};
pub use schema::{Metadata, Position, ShipState, WorkerAssignment, WorkerIdentity, WorkerRole};
pub use value::{ComponentMeta, ComponentRegistry, ComponentValue};
