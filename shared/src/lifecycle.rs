//! Death/respawn state machine shared by every copy of an entity

use serde::{Deserialize, Serialize};

/// Where an entity is in its life
///
/// `Dying` only lasts while the death presentation runs; copies settle in
/// `Dead` until the authority's respawn timer brings them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Alive,
    Dying,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Die,
    DeathPresented,
    Respawn,
}

impl LifecycleState {
    /// Returns the next state, or `None` when the event is not valid here
    pub fn transition(self, event: LifecycleEvent) -> Option<LifecycleState> {
        match (self, event) {
            (LifecycleState::Alive, LifecycleEvent::Die) => Some(LifecycleState::Dying),
            (LifecycleState::Dying, LifecycleEvent::DeathPresented) => Some(LifecycleState::Dead),
            (LifecycleState::Dead, LifecycleEvent::Respawn) => Some(LifecycleState::Alive),
            _ => None,
        }
    }

    pub fn is_alive(self) -> bool {
        self == LifecycleState::Alive
    }
}
