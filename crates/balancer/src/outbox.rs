//! Queue of writes waiting to be sent to the transport.
//!
//! Handlers never talk to the network. They queue [`WorldCommand`]s here and
//! the event loop drains the queue after each event.

use spatial_component::{ComponentValue, EntityId, RequestId, RequestIdAllocator};
use spatial_net::WorldCommand;
use tracing::error;

#[derive(Debug, Default)]
pub struct Outbox {
    requests: RequestIdAllocator,
    commands: Vec<WorldCommand>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity creation and return the id its acknowledgement will
    /// carry. Returns `None` if a component failed to encode; nothing is
    /// queued in that case.
    pub fn create(&mut self, components: Vec<ComponentValue>) -> Option<RequestId> {
        let mut encoded = Vec::with_capacity(components.len());
        for component in &components {
            match component.encode() {
                Ok(data) => encoded.push(data),
                Err(e) => {
                    error!(error = %e, "dropping entity creation");
                    return None;
                }
            }
        }
        let request_id = self.requests.allocate();
        self.commands.push(WorldCommand::CreateEntity {
            request_id,
            components: encoded,
        });
        Some(request_id)
    }

    /// Queue a component replacement. Returns `false` if the value failed to
    /// encode.
    pub fn update(&mut self, entity: EntityId, value: impl Into<ComponentValue>) -> bool {
        match value.into().encode() {
            Ok(data) => {
                self.commands
                    .push(WorldCommand::UpdateComponent { entity, data });
                true
            }
            Err(e) => {
                error!(%entity, error = %e, "dropping component update");
                false
            }
        }
    }

    pub fn delete(&mut self, entity: EntityId) {
        self.commands.push(WorldCommand::DeleteEntity { entity });
    }

    /// Take every queued command, oldest first.
    pub fn drain(&mut self) -> Vec<WorldCommand> {
        std::mem::take(&mut self.commands)
    }

    #[must_use]
    pub fn commands(&self) -> &[WorldCommand] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use spatial_component::{Metadata, WorkerAssignment, ids};

    use super::*;

    #[test]
    fn test_create_allocates_distinct_requests() {
        let mut outbox = Outbox::new();
        let a = outbox.create(vec![Metadata::new("Server").into()]).unwrap();
        let b = outbox.create(Vec::new()).unwrap();
        assert_ne!(a, b);
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn test_update_encodes_value() {
        let mut outbox = Outbox::new();
        assert!(outbox.update(EntityId(4), WorkerAssignment::from_index(Some(1))));
        match &outbox.commands()[0] {
            WorldCommand::UpdateComponent { entity, data } => {
                assert_eq!(*entity, EntityId(4));
                assert_eq!(data.component_type, ids::WORKER_ASSIGNMENT);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_drain_empties_in_order() {
        let mut outbox = Outbox::new();
        outbox.delete(EntityId(1));
        outbox.delete(EntityId(2));
        let drained = outbox.drain();
        assert_eq!(
            drained,
            vec![
                WorldCommand::DeleteEntity { entity: EntityId(1) },
                WorldCommand::DeleteEntity { entity: EntityId(2) },
            ]
        );
        assert!(outbox.is_empty());
    }
}
