use crate::game::ClientGameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use shared::{EntityId, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
// Full snapshots grow with the entity count
const RECEIVE_BUFFER_SIZE: usize = 65_536;

/// Picks a random living opponent to shoot at
pub fn choose_target(game_state: &ClientGameState) -> Option<EntityId> {
    let alive = game_state
        .local_entity()
        .map(|view| view.is_alive())
        .unwrap_or(false);

    if !alive || game_state.in_lobby() {
        return None;
    }

    game_state
        .living_opponents()
        .choose(&mut rand::thread_rng())
        .copied()
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: Option<String>,
    connected: bool,

    game_state: ClientGameState,

    fire_interval: Option<Duration>,
    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: Option<String>,
        fire_interval: Option<Duration>,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            name,
            connected: false,
            game_state: ClientGameState::new(),
            fire_interval,
            fake_ping_ms,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match &packet {
            Packet::Connected { .. } => self.connected = true,
            Packet::Disconnected { .. } => self.connected = false,
            _ => {}
        }

        if let Err(e) = self.game_state.apply_packet(packet) {
            // Usually a notification that overtook the entity's spawn; the next snapshot fixes it
            debug!("Dropped server packet: {}", e);
        }
    }

    async fn fire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }

        if let Some(target) = choose_target(&self.game_state) {
            debug!("Firing at {}", target);
            self.send_packet(&Packet::Hit { target }).await?;
        }

        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        // Never fires when auto-fire is off
        let mut fire_interval = interval(self.fire_interval.unwrap_or(Duration::from_secs(3600)));
        let auto_fire = self.fire_interval.is_some();

        let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    let disconnected = matches!(packet, Packet::Disconnected { .. });
                                    self.handle_packet(packet);
                                    if disconnected {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = fire_interval.tick(), if auto_fire => {
                    if let Err(e) = self.fire().await {
                        error!("Error sending hit: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving the arena");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Color, EntitySnapshot, FieldUpdate};

    fn snapshot(id: EntityId, alive: bool) -> EntitySnapshot {
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
                value: if alive { 100 } else { 0 },
            },
            alive,
            deaths: 0,
        }
    }

    fn state_with(local: EntityId, others: &[(EntityId, bool)]) -> ClientGameState {
        let mut state = ClientGameState::new();
        state.apply_packet(Packet::Connected { entity_id: local }).unwrap();
        state
            .apply_packet(Packet::Spawn {
                entity: snapshot(local, true),
            })
            .unwrap();
        for (id, alive) in others {
            state
                .apply_packet(Packet::Spawn {
                    entity: snapshot(*id, *alive),
                })
                .unwrap();
        }
        state
    }

    #[test]
    fn test_choose_target_skips_dead_and_self() {
        let state = state_with(1, &[(2, false), (3, true)]);

        for _ in 0..20 {
            assert_eq!(choose_target(&state), Some(3));
        }
    }

    #[test]
    fn test_no_target_when_alone() {
        let state = state_with(1, &[]);
        assert_eq!(choose_target(&state), None);
    }

    #[test]
    fn test_no_target_in_lobby() {
        let mut state = state_with(1, &[(2, true)]);
        state.apply_packet(Packet::ReturnToLobby).unwrap();

        assert_eq!(choose_target(&state), None);
    }

    #[tokio::test]
    async fn test_client_binds_and_parses_address() {
        let client = Client::new("127.0.0.1:8080", Some("Merlin".to_string()), None, 0)
            .await
            .unwrap();

        assert!(!client.connected);
        assert!(client.game_state().is_empty());
        assert!(Client::new("not an address", None, None, 0).await.is_err());
    }
}
