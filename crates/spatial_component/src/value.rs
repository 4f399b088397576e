//! Typed component values and the decoder registry.
//!
//! The transport delivers component payloads as [`ComponentData`]: a type id
//! plus opaque bytes. [`ComponentRegistry`] maps each known type id to a
//! decode function producing the matching [`ComponentValue`] variant, so the
//! rest of the balancer works with concrete types and never inspects bytes.

use std::collections::HashMap;

use crate::acl::EntityAcl;
use crate::component::{Component, ComponentData, ComponentTypeId};
use crate::error::ComponentError;
use crate::interest::Interest;
use crate::schema::{Metadata, Position, ShipState, WorkerAssignment, WorkerIdentity};

/// A decoded payload of one of the well-known component types.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Acl(EntityAcl),
    Metadata(Metadata),
    Position(Position),
    Interest(Interest),
    Worker(WorkerIdentity),
    WorkerAssignment(WorkerAssignment),
    Ship(ShipState),
}

impl ComponentValue {
    /// The component type of this value.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        match self {
            Self::Acl(_) => EntityAcl::TYPE_ID,
            Self::Metadata(_) => Metadata::TYPE_ID,
            Self::Position(_) => Position::TYPE_ID,
            Self::Interest(_) => Interest::TYPE_ID,
            Self::Worker(_) => WorkerIdentity::TYPE_ID,
            Self::WorkerAssignment(_) => WorkerAssignment::TYPE_ID,
            Self::Ship(_) => ShipState::TYPE_ID,
        }
    }

    /// Encode into a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Encode`] if serialisation fails.
    pub fn encode(&self) -> Result<ComponentData, ComponentError> {
        match self {
            Self::Acl(v) => v.to_data(),
            Self::Metadata(v) => v.to_data(),
            Self::Position(v) => v.to_data(),
            Self::Interest(v) => v.to_data(),
            Self::Worker(v) => v.to_data(),
            Self::WorkerAssignment(v) => v.to_data(),
            Self::Ship(v) => v.to_data(),
        }
    }
}

macro_rules! impl_from_component {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ComponentValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_component! {
    EntityAcl => Acl,
    Metadata => Metadata,
    Position => Position,
    Interest => Interest,
    WorkerIdentity => Worker,
    WorkerAssignment => WorkerAssignment,
    ShipState => Ship,
}

/// Decoder metadata for one component type.
#[derive(Debug, Clone, Copy)]
pub struct ComponentMeta {
    /// The unique type identifier.
    pub type_id: ComponentTypeId,
    /// The human-readable name of the component.
    pub name: &'static str,
    /// Decode a payload into its typed value.
    pub decode_fn: fn(&[u8]) -> Result<ComponentValue, ComponentError>,
}

/// Maps component type ids to decoders.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    metas: HashMap<ComponentTypeId, ComponentMeta>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every well-known component registered.
    #[must_use]
    pub fn with_known_components() -> Self {
        let mut registry = Self::new();
        registry.register::<EntityAcl>();
        registry.register::<Metadata>();
        registry.register::<Position>();
        registry.register::<Interest>();
        registry.register::<WorkerIdentity>();
        registry.register::<WorkerAssignment>();
        registry.register::<ShipState>();
        registry
    }

    /// Register a component type.
    pub fn register<T>(&mut self)
    where
        T: Component + Into<ComponentValue>,
    {
        self.metas.insert(
            T::TYPE_ID,
            ComponentMeta {
                type_id: T::TYPE_ID,
                name: T::type_name(),
                decode_fn: |bytes| T::from_payload(bytes).map(Into::into),
            },
        );
    }

    /// Returns `true` if a decoder is registered for `type_id`.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.metas.contains_key(&type_id)
    }

    /// Returns the decoder metadata for a type id.
    #[must_use]
    pub fn meta(&self, type_id: ComponentTypeId) -> Option<&ComponentMeta> {
        self.metas.get(&type_id)
    }

    /// Decode a wire record.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::UnknownComponent`] for unregistered types and
    /// [`ComponentError::Decode`] for malformed payloads.
    pub fn decode(&self, data: &ComponentData) -> Result<ComponentValue, ComponentError> {
        let meta = self
            .metas
            .get(&data.component_type)
            .ok_or(ComponentError::UnknownComponent(data.component_type))?;
        (meta.decode_fn)(&data.payload)
    }
}
