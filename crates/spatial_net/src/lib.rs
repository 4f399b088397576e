//! # spatial_net
//!
//! NATS transport layer between the spatial balancer and the world-state
//! runtime.
//!
//! This crate provides:
//!
//! - [`subjects`]: NATS subject hierarchy constants and builders.
//! - [`messages`]: inbound [`WorldOp`]s and outbound [`WorldCommand`]s.
//! - [`codec`]: MessagePack serialisation/deserialisation helpers.
//! - [`connection`]: NATS connection management.
//! - [`error`]: Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod subjects;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
pub use messages::{Authority, FlagUpdate, WorldCommand, WorldOp};
