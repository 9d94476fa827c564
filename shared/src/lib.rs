use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod entity;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod sinks;

pub use entity::{Control, EntitySnapshot, EntityView, FieldChange};
pub use error::{CoreError, Role};
pub use field::{FieldUpdate, ReplicatedField};
pub use lifecycle::{LifecycleEvent, LifecycleState};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_HEALTH: i32 = 100;
pub const DAMAGE_PER_HIT: i32 = 20;
pub const RESPAWN_DELAY_SECS: f32 = 4.0;
pub const LOBBY_RETURN_DELAY_SECS: f32 = 7.0;
pub const SCORE_TO_WIN: u32 = 5;

pub type EntityId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const PALETTE: [Color; 8] = [
        Color::new(66, 135, 245),
        Color::new(235, 64, 52),
        Color::new(67, 191, 85),
        Color::new(155, 89, 182),
        Color::new(243, 156, 18),
        Color::new(26, 188, 156),
        Color::new(232, 67, 147),
        Color::new(241, 196, 15),
    ];

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Default tint for an entity, cycling through the palette by id
    pub fn for_entity(id: EntityId) -> Self {
        Self::PALETTE[id as usize % Self::PALETTE.len()]
    }
}

/// Where and facing which way an entity re-enters the arena
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub position: (f32, f32, f32),
    /// Orientation around the vertical axis, in degrees
    pub yaw: f32,
}

impl SpawnPoint {
    pub fn new(position: (f32, f32, f32), yaw: f32) -> Self {
        Self { position, yaw }
    }
}

/// Gameplay parameters, shared by every entity of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub max_health: i32,
    pub damage_per_hit: i32,
    pub respawn_delay: Duration,
    pub lobby_return_delay: Duration,
    pub score_to_win: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            damage_per_hit: DAMAGE_PER_HIT,
            respawn_delay: Duration::from_secs_f32(RESPAWN_DELAY_SECS),
            lobby_return_delay: Duration::from_secs_f32(LOBBY_RETURN_DELAY_SECS),
            score_to_win: SCORE_TO_WIN,
        }
    }
}

pub fn default_name(id: EntityId) -> String {
    format!("Wizard{}", id)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: Option<String>,
    },
    Hit {
        target: EntityId,
    },
    Heartbeat,
    Disconnect,

    Connected {
        entity_id: EntityId,
    },
    Spawn {
        entity: EntitySnapshot,
    },
    Despawn {
        entity: EntityId,
    },
    FieldChanged {
        entity: EntityId,
        change: FieldChange,
    },
    Damaged {
        entity: EntityId,
        died: bool,
    },
    Respawned {
        entity: EntityId,
        spawn: SpawnPoint,
    },
    GameOver {
        entity: EntityId,
        winner_id: EntityId,
        winner_name: String,
    },
    MatchStarted,
    ReturnToLobby,
    Snapshot {
        entities: Vec<EntitySnapshot>,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_config_values() {
        let config = GameConfig::default();
        assert_eq!(config.max_health, 100);
        assert_eq!(config.damage_per_hit, 20);
        assert_eq!(config.respawn_delay, Duration::from_secs(4));
        assert_eq!(config.lobby_return_delay, Duration::from_secs(7));
        assert_eq!(config.score_to_win, 5);
    }

    #[test]
    fn test_palette_cycles_by_id() {
        assert_eq!(Color::for_entity(1), Color::PALETTE[1]);
        assert_eq!(Color::for_entity(9), Color::PALETTE[1]);
        assert_ne!(Color::for_entity(1), Color::for_entity(2));
    }

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(7), "Wizard7");
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: Some("Merlin".to_string()),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                name,
            } => {
                assert_eq!(client_version, 1);
                assert_eq!(name.as_deref(), Some("Merlin"));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_respawned() {
        let packet = Packet::Respawned {
            entity: 3,
            spawn: SpawnPoint::new((12.5, 0.0, -3.25), 180.0),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Respawned { entity, spawn } => {
                assert_eq!(entity, 3);
                assert_approx_eq!(spawn.position.0, 12.5, 0.001);
                assert_approx_eq!(spawn.position.2, -3.25, 0.001);
                assert_approx_eq!(spawn.yaw, 180.0, 0.001);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_field_changed() {
        let packet = Packet::FieldChanged {
            entity: 2,
            change: FieldChange::Health(FieldUpdate {
                version: 4,
                value: 40,
            }),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::FieldChanged { entity, change } => {
                assert_eq!(entity, 2);
                assert_eq!(
                    change,
                    FieldChange::Health(FieldUpdate {
                        version: 4,
                        value: 40
                    })
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
