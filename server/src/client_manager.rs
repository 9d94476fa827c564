//! Connection bookkeeping for the arena server
//!
//! Every connected client drives exactly one entity, and the entity id doubles
//! as the client id. This module tracks:
//! - Which address owns which entity
//! - When each client was last heard from, for timeout detection
//! - The server's capacity limit

use log::info;
use shared::EntityId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Silence after which a client is considered gone
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and the entity it drives
#[derive(Debug)]
pub struct Client {
    pub entity_id: EntityId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(entity_id: EntityId, addr: SocketAddr) -> Self {
        Self {
            entity_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected clients, keyed by the entity they drive
pub struct ClientManager {
    clients: HashMap<EntityId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers the client driving `entity_id`
    ///
    /// Returns false when the server is at capacity or the entity already has
    /// a client.
    pub fn add_client(&mut self, entity_id: EntityId, addr: SocketAddr) -> bool {
        if self.is_full() || self.clients.contains_key(&entity_id) {
            return false;
        }

        info!("Client for entity {} connected from {}", entity_id, addr);
        self.clients.insert(entity_id, Client::new(entity_id, addr));
        true
    }

    /// Returns true if the client was found and removed
    pub fn remove_client(&mut self, entity_id: &EntityId) -> bool {
        if let Some(client) = self.clients.remove(entity_id) {
            info!("Client for entity {} disconnected", client.entity_id);
            true
        } else {
            false
        }
    }

    /// Finds the entity driven from the given address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<EntityId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.entity_id)
    }

    pub fn addr_of(&self, entity_id: EntityId) -> Option<SocketAddr> {
        self.clients.get(&entity_id).map(|client| client.addr)
    }

    /// Records activity from a client; false if it is unknown
    pub fn touch(&mut self, entity_id: EntityId) -> bool {
        match self.clients.get_mut(&entity_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Removes every client silent for longer than [`CLIENT_TIMEOUT`]
    pub fn check_timeouts(&mut self) -> Vec<EntityId> {
        self.check_timeouts_after(CLIENT_TIMEOUT)
    }

    pub fn check_timeouts_after(&mut self, timeout: Duration) -> Vec<EntityId> {
        let timed_out: Vec<EntityId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.entity_id)
            .collect();

        for entity_id in &timed_out {
            self.remove_client(entity_id);
        }

        timed_out
    }

    /// Every (entity id, address) pair, for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(EntityId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.entity_id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
