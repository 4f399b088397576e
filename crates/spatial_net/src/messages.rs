//! Message types exchanged between the balancer and the transport.
//!
//! All message types derive `Serialize` and `Deserialize` for MessagePack
//! transport. The message kind is also carried in the `msg-type` NATS header
//! so routers can filter without decoding payloads.

use serde::{Deserialize, Serialize};
use spatial_component::{ComponentData, ComponentTypeId, EntityId, RequestId};

// ── Inbound ops ─────────────────────────────────────────────────────────────

/// Authority state of the local worker over one component of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    NotAuthoritative,
    Authoritative,
    AuthorityLossImminent,
}

impl Authority {
    /// Returns `true` while writes from the local worker are accepted.
    #[must_use]
    pub fn is_authoritative(self) -> bool {
        matches!(self, Self::Authoritative | Self::AuthorityLossImminent)
    }
}

/// A notification delivered by the transport to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldOp {
    /// An entity entered the worker's view.
    AddEntity { entity: EntityId },
    /// An entity left the worker's view or was deleted.
    RemoveEntity { entity: EntityId },
    /// A component was added to a visible entity.
    AddComponent { entity: EntityId, data: ComponentData },
    /// A component was removed from a visible entity.
    RemoveComponent {
        entity: EntityId,
        component_type: ComponentTypeId,
    },
    /// A component of a visible entity changed.
    ComponentUpdate { entity: EntityId, data: ComponentData },
    /// The worker gained or lost write authority over a component.
    AuthorityChange {
        entity: EntityId,
        component_type: ComponentTypeId,
        authority: Authority,
    },
    /// Acknowledgement of a [`WorldCommand::CreateEntity`]. `entity` is
    /// `None` when creation failed.
    CreateEntity {
        request_id: RequestId,
        entity: Option<EntityId>,
    },
    /// Acknowledgement of a [`WorldCommand::DeleteEntity`].
    DeleteEntity { entity: EntityId },
    /// A runtime flag changed. `None` means the flag was cleared.
    FlagUpdate { key: String, value: Option<String> },
    /// The transport refused a component write.
    CommandRejected {
        entity: EntityId,
        component_type: ComponentTypeId,
        reason: String,
    },
    /// The worker's connection is being closed.
    Disconnect { reason: String },
}

impl WorldOp {
    /// The `msg-type` header value for this op.
    #[must_use]
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::AddEntity { .. } => "add_entity",
            Self::RemoveEntity { .. } => "remove_entity",
            Self::AddComponent { .. } => "add_component",
            Self::RemoveComponent { .. } => "remove_component",
            Self::ComponentUpdate { .. } => "component_update",
            Self::AuthorityChange { .. } => "authority_change",
            Self::CreateEntity { .. } => "create_entity",
            Self::DeleteEntity { .. } => "delete_entity",
            Self::FlagUpdate { .. } => "flag_update",
            Self::CommandRejected { .. } => "command_rejected",
            Self::Disconnect { .. } => "disconnect",
        }
    }
}

/// A runtime flag change published on
/// [`subjects::FLAG_UPDATE`](crate::subjects::FLAG_UPDATE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub key: String,
    pub value: Option<String>,
}

impl From<FlagUpdate> for WorldOp {
    fn from(flag: FlagUpdate) -> Self {
        Self::FlagUpdate {
            key: flag.key,
            value: flag.value,
        }
    }
}

// ── Outbound commands ───────────────────────────────────────────────────────

/// A write sent by a worker to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldCommand {
    /// Create an entity with an initial component set. The transport answers
    /// with [`WorldOp::CreateEntity`] carrying the same `request_id`.
    CreateEntity {
        request_id: RequestId,
        components: Vec<ComponentData>,
    },
    /// Replace one component of an entity.
    UpdateComponent { entity: EntityId, data: ComponentData },
    /// Delete an entity.
    DeleteEntity { entity: EntityId },
}

impl WorldCommand {
    /// The `msg-type` header value for this command.
    #[must_use]
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::CreateEntity { .. } => "create_entity",
            Self::UpdateComponent { .. } => "update_component",
            Self::DeleteEntity { .. } => "delete_entity",
        }
    }
}

// ── NATS header keys ────────────────────────────────────────────────────────

/// Standard NATS header keys used for routing metadata.
pub mod headers {
    /// The message type (e.g. `"add_entity"`, `"update_component"`).
    pub const MSG_TYPE: &str = "msg-type";
    /// The worker id of the sender.
    pub const WORKER_ID: &str = "worker-id";
}
