//! Active entities of one session, used for authority-side fan-out

use log::debug;
use shared::EntityId;

/// Set of active entity ids in join order
///
/// Owned by the session; membership is only consulted when the authority
/// needs to reach every participant, never for presentation.
#[derive(Debug, Default, Clone)]
pub struct EntityRegistry {
    entries: Vec<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity; returns false if it was already registered
    pub fn register(&mut self, id: EntityId) -> bool {
        if self.entries.contains(&id) {
            return false;
        }

        self.entries.push(id);
        debug!("Registered entity {} ({} active)", id, self.entries.len());
        true
    }

    /// Removes an entity; returns false if it was not registered
    pub fn unregister(&mut self, id: EntityId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != id);
        before != self.entries.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains(&id)
    }

    /// Stable copy of the membership, safe to iterate while the registry changes
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
