//! Core [`Component`] trait and the component type catalogue.
//!
//! Component types are identified on the wire by small integers assigned by
//! the world-state transport. The ids the balancer cares about are collected
//! in [`ids`]; anything else is carried through as an opaque id.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// A component type identifier as used by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u32);

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match ids::name_of(*self) {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "Component({})", self.0),
        }
    }
}

/// Well-known component type ids.
pub mod ids {
    use super::ComponentTypeId;

    /// Access-control list (read + per-component write requirements).
    pub const ACL: ComponentTypeId = ComponentTypeId(50);
    /// Entity metadata (display name).
    pub const METADATA: ComponentTypeId = ComponentTypeId(53);
    /// World position.
    pub const POSITION: ComponentTypeId = ComponentTypeId(54);
    /// Query-based interest.
    pub const INTEREST: ComponentTypeId = ComponentTypeId(58);
    /// Worker identity, present on the system entity of every connected worker.
    pub const WORKER: ComponentTypeId = ComponentTypeId(60);
    /// Ship gameplay state.
    pub const SHIP: ComponentTypeId = ComponentTypeId(1000);
    /// Projectile gameplay state.
    pub const BULLET: ComponentTypeId = ComponentTypeId(1001);
    /// Player input, written by the owning client.
    pub const PLAYER_INPUT: ComponentTypeId = ComponentTypeId(1003);
    /// The partition cell index written by the balancer.
    pub const WORKER_ASSIGNMENT: ComponentTypeId = ComponentTypeId(1005);
    /// Visual effect state.
    pub const EFFECT: ComponentTypeId = ComponentTypeId(1006);

    /// Human-readable name of a well-known component type.
    #[must_use]
    pub fn name_of(id: ComponentTypeId) -> Option<&'static str> {
        let name = match id {
            ACL => "Acl",
            METADATA => "Metadata",
            POSITION => "Position",
            INTEREST => "Interest",
            WORKER => "Worker",
            SHIP => "Ship",
            BULLET => "Bullet",
            PLAYER_INPUT => "PlayerInput",
            WORKER_ASSIGNMENT => "WorkerAssignment",
            EFFECT => "Effect",
            _ => return None,
        };
        Some(name)
    }
}

/// The core component trait.
///
/// Every payload the balancer reads or writes implements this trait. The
/// associated [`Component::TYPE_ID`] binds the Rust type to its wire id.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use spatial_component::{Component, ComponentTypeId};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     const TYPE_ID: ComponentTypeId = ComponentTypeId(2000);
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Clone + Send + Sync + 'static + Serialize + DeserializeOwned {
    /// The transport's id for this component type.
    const TYPE_ID: ComponentTypeId;

    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Encode this component into a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if serialisation fails.
    fn to_data(&self) -> Result<ComponentData, ComponentError> {
        let payload = rmp_serde::to_vec_named(self).map_err(|source| ComponentError::Encode {
            component: Self::TYPE_ID,
            source,
        })?;
        Ok(ComponentData {
            component_type: Self::TYPE_ID,
            payload,
        })
    }

    /// Decode this component from a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Decode`] if the payload is not a valid
    /// encoding of `Self`.
    fn from_payload(payload: &[u8]) -> Result<Self, ComponentError> {
        rmp_serde::from_slice(payload).map_err(|source| ComponentError::Decode {
            component: Self::TYPE_ID,
            source,
        })
    }
}

/// A component payload as carried by the transport: the type id plus its
/// MessagePack bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentData {
    /// The component type of the payload.
    pub component_type: ComponentTypeId,
    /// MessagePack-encoded component bytes.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        const TYPE_ID: ComponentTypeId = ComponentTypeId(2000);

        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_to_data_carries_type_id() {
        let health = Health {
            current: 80.0,
            max: 100.0,
        };
        let data = health.to_data().unwrap();
        assert_eq!(data.component_type, ComponentTypeId(2000));
        assert_eq!(Health::from_payload(&data.payload).unwrap(), health);
    }

    #[test]
    fn test_from_payload_rejects_garbage() {
        let err = Health::from_payload(&[0xc1]).unwrap_err();
        assert!(matches!(
            err,
            ComponentError::Decode {
                component: ComponentTypeId(2000),
                ..
            }
        ));
    }

    #[test]
    fn test_display_uses_catalogue_name() {
        assert_eq!(ids::POSITION.to_string(), "Position(54)");
        assert_eq!(ComponentTypeId(7).to_string(), "Component(7)");
    }
}
