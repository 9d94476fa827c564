//! Server network layer handling UDP communications and the session loop

use crate::client_manager::ClientManager;
use crate::game::{GameState, Outbound, Target};
use crate::match_controller::MatchPhase;
use crate::spawn::SpawnRing;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::sinks::LobbyManager;
use shared::{EntityId, GameConfig, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Ticks between two full-state resync broadcasts
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 60;

const SPAWN_POINTS: usize = 8;
const ARENA_RADIUS: f32 = 12.0;
const SPAWN_YAW_JITTER: f32 = 10.0;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        entity_id: EntityId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<EntityId>,
    },
}

/// Lobby collaborator that tells every connected client to go back to the lobby
#[derive(Debug, Clone)]
pub struct ChannelLobby {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelLobby {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl LobbyManager for ChannelLobby {
    fn return_all_to_lobby(&self) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: Packet::ReturnToLobby,
            exclude: None,
        }) {
            error!("Failed to queue lobby return: {}", e);
        }
    }
}

/// Turns a queued session packet into a network message
///
/// `Only` targets without a connected client (ghosts) produce nothing.
pub fn route(outbound: Outbound, addr_of: impl Fn(EntityId) -> Option<SocketAddr>) -> Option<GameMessage> {
    let Outbound { target, packet } = outbound;

    match target {
        Target::All => Some(GameMessage::BroadcastPacket {
            packet,
            exclude: None,
        }),
        Target::AllExcept(id) => Some(GameMessage::BroadcastPacket {
            packet,
            exclude: Some(id),
        }),
        Target::Only(id) => addr_of(id).map(|addr| GameMessage::SendPacket { packet, addr }),
    }
}

/// Main server coordinating networking and the authoritative session
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,
    snapshot_interval: u32,
    lobby_wait: Duration,
    lobby_since: Option<Instant>,
    started: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    /// Binds the socket and seeds the session with `ghosts` bot entities
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: GameConfig,
        ghosts: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let spawns = SpawnRing::arena(SPAWN_POINTS, ARENA_RADIUS).with_yaw_jitter(SPAWN_YAW_JITTER);
        let lobby = ChannelLobby::new(game_tx.clone());
        let mut game_state = GameState::new(config, Arc::new(spawns), Arc::new(lobby));

        for _ in 0..ghosts {
            game_state.join(None, false);
        }
        // Nobody is connected yet; joiners get the full state anyway
        game_state.drain_outbox();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state,
            tick_duration,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            lobby_wait: Duration::from_secs(3),
            lobby_since: None,
            started: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn with_snapshot_interval(mut self, ticks: u32) -> Self {
        self.snapshot_interval = ticks.max(1);
        self
    }

    /// How long the lobby lasts before the next match starts
    pub fn with_lobby_wait(mut self, wait: Duration) -> Self {
        self.lobby_wait = wait;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (entity_id, addr) in client_addrs {
                            if Some(entity_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", entity_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for entity_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { entity_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<EntityId>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, exclude }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Hands everything the session queued to the sender task, in order
    async fn flush_outbox(&mut self) {
        let outbox = self.game_state.drain_outbox();
        if outbox.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for outbound in outbox {
            if let Some(message) = route(outbound, |id| clients.addr_of(id)) {
                if let Err(e) = self.game_tx.send(message) {
                    error!("Failed to queue outgoing packet: {}", e);
                }
            }
        }
    }

    async fn client_at(&self, addr: SocketAddr) -> Option<EntityId> {
        let mut clients = self.clients.write().await;
        let entity_id = clients.find_client_by_addr(addr)?;
        clients.touch(entity_id);
        Some(entity_id)
    }

    async fn disconnect_client(&mut self, entity_id: EntityId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&entity_id);
        }
        self.game_state.leave(entity_id);
    }

    /// Processes incoming packets and updates the session
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.disconnect_client(existing_id).await;
                }

                let full = {
                    let clients = self.clients.read().await;
                    clients.is_full()
                };
                if full {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let entity_id = self.game_state.join(name, true);
                let added = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(entity_id, addr)
                };

                if added {
                    // Must reach the client before the snapshots join queued for it
                    self.send_packet(Packet::Connected { entity_id }, addr);
                } else {
                    warn!("Could not register client for entity {} at {}", entity_id, addr);
                    self.game_state.leave(entity_id);
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Connection rejected".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Hit { target } => {
                if let Some(shooter) = self.client_at(addr).await {
                    // Respawn timers start from the moment of the hit, not the last tick
                    self.game_state.advance(self.started.elapsed());
                    if let Err(e) = self.game_state.record_hit(shooter, target) {
                        warn!("Rejected hit from {}: {}", shooter, e);
                    }
                }
            }

            Packet::Heartbeat => {
                if self.client_at(addr).await.is_none() {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                if let Some(entity_id) = self.client_at(addr).await {
                    self.disconnect_client(entity_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }

        self.flush_outbox().await;
    }

    /// Advances the session clock and starts the next match once the lobby is over
    async fn tick(&mut self) {
        self.game_state.tick += 1;
        self.game_state.advance(self.started.elapsed());

        match self.game_state.phase() {
            MatchPhase::Lobby => {
                let since = *self.lobby_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.lobby_wait {
                    self.lobby_since = None;
                    self.game_state.start_match();
                }
            }
            _ => self.lobby_since = None,
        }

        self.flush_outbox().await;

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count > 0 && self.game_state.tick % self.snapshot_interval == 0 {
            self.broadcast_packet(self.game_state.sync_packet(), None);
        }

        if self.game_state.tick % 300 == 0 && client_count > 0 {
            debug!(
                "Tick {}: {} clients, {} entities, {} timers pending",
                self.game_state.tick,
                client_count,
                self.game_state.len(),
                self.game_state.pending_timers()
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        self.started = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { entity_id }) => {
                            info!("Client {} timed out", entity_id);
                            self.game_state.leave(entity_id);
                            self.flush_outbox().await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.tick().await;
                },
            }
        }

        Ok(())
    }
}
