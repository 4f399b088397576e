//! Component-layer error types.

use crate::component::ComponentTypeId;

/// Errors that can occur while encoding or decoding component payloads.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// No decoder is registered for this component type.
    #[error("unknown component type {0}")]
    UnknownComponent(ComponentTypeId),

    /// Failed to encode a component to MessagePack.
    #[error("failed to encode {component}: {source}")]
    Encode {
        component: ComponentTypeId,
        #[source]
        source: rmp_serde::encode::Error,
    },

    /// Failed to decode a component from MessagePack.
    #[error("failed to decode {component}: {source}")]
    Decode {
        component: ComponentTypeId,
        #[source]
        source: rmp_serde::decode::Error,
    },
}
