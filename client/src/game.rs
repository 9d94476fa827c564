//! Client-side replica of the arena
//!
//! Every entity is an observer copy; the one this client drives is marked
//! local so its reactions reach the HUD and camera.

use log::{debug, info, warn};
use shared::sinks::Sinks;
use shared::{CoreError, EntityId, EntitySnapshot, EntityView, Packet};
use std::collections::HashMap;

pub type SinkFactory = Box<dyn Fn(EntityId) -> Sinks + Send + Sync>;

pub struct ClientGameState {
    local_id: Option<EntityId>,
    entities: HashMap<EntityId, EntityView>,
    in_lobby: bool,
    sink_factory: SinkFactory,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::with_sink_factory(Box::new(Sinks::logging))
    }

    pub fn with_sink_factory(sink_factory: SinkFactory) -> Self {
        Self {
            local_id: None,
            entities: HashMap::new(),
            in_lobby: false,
            sink_factory,
        }
    }

    pub fn local_id(&self) -> Option<EntityId> {
        self.local_id
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.get(&id)
    }

    pub fn local_entity(&self) -> Option<&EntityView> {
        self.local_id.and_then(|id| self.entities.get(&id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn in_lobby(&self) -> bool {
        self.in_lobby
    }

    /// Living entities other than our own, lowest id first
    pub fn living_opponents(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .values()
            .filter(|view| view.is_alive() && Some(view.id()) != self.local_id)
            .map(EntityView::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Applies one packet from the server to the replica
    pub fn apply_packet(&mut self, packet: Packet) -> Result<(), CoreError> {
        match packet {
            Packet::Connected { entity_id } => {
                info!("Connected as entity {}", entity_id);
                self.local_id = Some(entity_id);

                // A copy that arrived first was built as a remote one
                if let Some(existing) = self.entities.remove(&entity_id) {
                    self.spawn(existing.snapshot())?;
                }
            }

            Packet::Spawn { entity } => self.spawn(entity)?,

            Packet::Despawn { entity } => {
                if self.entities.remove(&entity).is_some() {
                    debug!("Entity {} despawned", entity);
                }
            }

            Packet::FieldChanged { entity, change } => {
                self.view_mut(entity)?.apply(change)?;
            }

            Packet::Damaged { entity, died } => {
                self.view_mut(entity)?.on_damaged(died);
            }

            Packet::Respawned { entity, spawn } => {
                self.view_mut(entity)?.respawn(&spawn);
            }

            Packet::GameOver {
                entity,
                winner_id,
                winner_name,
            } => {
                self.view_mut(entity)?.on_game_over(winner_id, &winner_name);
            }

            Packet::MatchStarted => {
                info!("New match started");
                self.in_lobby = false;
                for view in self.entities.values_mut() {
                    view.on_match_started();
                }
            }

            Packet::ReturnToLobby => {
                info!("Returning to the lobby");
                self.in_lobby = true;
            }

            Packet::Snapshot { entities } => self.resync(entities)?,

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.local_id = None;
                self.entities.clear();
            }

            other => {
                warn!("Unexpected packet from server: {:?}", other);
            }
        }

        Ok(())
    }

    fn spawn(&mut self, snapshot: EntitySnapshot) -> Result<(), CoreError> {
        if let Some(view) = self.entities.get_mut(&snapshot.id) {
            return view.apply_snapshot(snapshot);
        }

        let id = snapshot.id;
        let view = EntityView::from_snapshot(snapshot, self.local_id, (self.sink_factory)(id));
        debug!("Entity {} ({}) spawned", id, view.name());
        self.entities.insert(id, view);
        Ok(())
    }

    /// Brings the replica in line with a full snapshot, dropping entities we missed leaving
    fn resync(&mut self, snapshots: Vec<EntitySnapshot>) -> Result<(), CoreError> {
        let present: Vec<EntityId> = snapshots.iter().map(|snapshot| snapshot.id).collect();
        self.entities.retain(|id, _| present.contains(id));

        for snapshot in snapshots {
            self.spawn(snapshot)?;
        }
        Ok(())
    }

    fn view_mut(&mut self, id: EntityId) -> Result<&mut EntityView, CoreError> {
        self.entities
            .get_mut(&id)
            .ok_or(CoreError::UnknownEntity(id))
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::entity::{loss_status, DEAD_STATUS};
    use shared::sinks::{RecordingSinks, SinkEvent};
    use shared::{Color, FieldChange, FieldUpdate, LifecycleState, SpawnPoint};

    fn snapshot(id: EntityId, health: i32, alive: bool) -> EntitySnapshot {
        EntitySnapshot {
            id,
            controlled: true,
            name: FieldUpdate {
                version: 1,
                value: format!("Wizard{}", id),
            },
            color: FieldUpdate {
                version: 1,
                value: Color::for_entity(id),
            },
            health: FieldUpdate {
                version: 1,
                value: health,
            },
            alive,
            deaths: 0,
        }
    }

    fn recording_state() -> (ClientGameState, RecordingSinks) {
        let recorder = RecordingSinks::new();
        let shared = recorder.clone();
        let state = ClientGameState::with_sink_factory(Box::new(move |_| shared.sinks()));
        (state, recorder)
    }

    #[test]
    fn test_connect_then_spawn_marks_local() {
        let (mut state, _) = recording_state();

        state.apply_packet(Packet::Connected { entity_id: 2 }).unwrap();
        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(1, 100, true),
            })
            .unwrap();
        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(2, 100, true),
            })
            .unwrap();

        assert_eq!(state.len(), 2);
        assert!(state.local_entity().unwrap().is_local());
        assert!(!state.entity(1).unwrap().is_local());
        assert_eq!(state.living_opponents(), vec![1]);
    }

    #[test]
    fn test_late_connected_rebuilds_local_copy() {
        let (mut state, _) = recording_state();

        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(3, 60, true),
            })
            .unwrap();
        state.apply_packet(Packet::Connected { entity_id: 3 }).unwrap();

        let local = state.local_entity().unwrap();
        assert!(local.is_local());
        assert_eq!(local.health(), 60);
    }

    #[test]
    fn test_damage_and_death_on_local_copy() {
        let (mut state, recorder) = recording_state();
        state.apply_packet(Packet::Connected { entity_id: 1 }).unwrap();
        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(1, 20, true),
            })
            .unwrap();
        recorder.clear();

        // The damage notice may overtake the health update
        state
            .apply_packet(Packet::Damaged {
                entity: 1,
                died: true,
            })
            .unwrap();
        state
            .apply_packet(Packet::FieldChanged {
                entity: 1,
                change: FieldChange::Health(FieldUpdate { version: 2, value: 0 }),
            })
            .unwrap();

        let local = state.local_entity().unwrap();
        assert_eq!(local.state(), LifecycleState::Dead);
        assert_eq!(local.health(), 0);
        assert_eq!(recorder.statuses(), vec![DEAD_STATUS.to_string()]);
        assert_eq!(recorder.count(&SinkEvent::FlashDamage), 1);
        assert_eq!(recorder.count(&SinkEvent::SetHealth(0)), 1);
    }

    #[test]
    fn test_respawn_moves_local_copy() {
        let (mut state, recorder) = recording_state();
        state.apply_packet(Packet::Connected { entity_id: 1 }).unwrap();
        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(1, 0, false),
            })
            .unwrap();

        let spawn = SpawnPoint::new((2.0, 0.0, 3.0), 180.0);
        state
            .apply_packet(Packet::Respawned { entity: 1, spawn })
            .unwrap();

        assert!(state.local_entity().unwrap().is_alive());
        assert_eq!(recorder.count(&SinkEvent::MoveTo(spawn)), 1);
    }

    #[test]
    fn test_game_over_and_new_match() {
        let (mut state, recorder) = recording_state();
        state.apply_packet(Packet::Connected { entity_id: 1 }).unwrap();
        for id in [1, 2] {
            state
                .apply_packet(Packet::Spawn {
                    entity: snapshot(id, 100, true),
                })
                .unwrap();
        }

        for id in [1, 2] {
            state
                .apply_packet(Packet::GameOver {
                    entity: id,
                    winner_id: 2,
                    winner_name: "Wizard2".to_string(),
                })
                .unwrap();
        }
        assert_eq!(recorder.statuses(), vec![loss_status("Wizard2")]);
        assert!(!state.entity(1).unwrap().is_shown());

        state.apply_packet(Packet::ReturnToLobby).unwrap();
        assert!(state.in_lobby());

        state.apply_packet(Packet::MatchStarted).unwrap();
        assert!(!state.in_lobby());
        assert!(state.entity(1).unwrap().is_shown());
        assert!(state.entity(2).unwrap().is_shown());
    }

    #[test]
    fn test_snapshot_drops_missing_entities() {
        let (mut state, _) = recording_state();
        for id in [1, 2, 3] {
            state
                .apply_packet(Packet::Spawn {
                    entity: snapshot(id, 100, true),
                })
                .unwrap();
        }

        state
            .apply_packet(Packet::Snapshot {
                entities: vec![snapshot(1, 100, true), snapshot(3, 100, true)],
            })
            .unwrap();

        assert_eq!(state.len(), 2);
        assert!(state.entity(2).is_none());
    }

    #[test]
    fn test_unknown_entity_is_reported() {
        let (mut state, _) = recording_state();

        let result = state.apply_packet(Packet::Damaged {
            entity: 9,
            died: false,
        });

        assert_eq!(result, Err(CoreError::UnknownEntity(9)));
    }

    #[test]
    fn test_stale_field_change_is_ignored() {
        let (mut state, _) = recording_state();
        let mut entity = snapshot(1, 80, true);
        entity.health.version = 3;
        state.apply_packet(Packet::Spawn { entity }).unwrap();

        state
            .apply_packet(Packet::FieldChanged {
                entity: 1,
                change: FieldChange::Health(FieldUpdate { version: 2, value: 100 }),
            })
            .unwrap();

        assert_eq!(state.entity(1).unwrap().health(), 80);
    }
}
