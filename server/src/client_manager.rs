//! Connection registry for the game server.
//!
//! Each live connection owns an outbound queue drained by a dedicated writer
//! task. The registry maps player identities to those queues so the server can
//! address one player or broadcast to everybody else without touching sockets
//! while it holds the room lock.

use log::{debug, info};
use shared::{Identity, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A connected player and the queue feeding its socket.
#[derive(Debug)]
pub struct Client {
    /// Identity assigned by the server at accept time
    pub identity: Identity,
    /// Remote address, kept for logging
    pub addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Client {
    pub fn new(
        identity: Identity,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            identity,
            addr,
            outbound,
        }
    }

    /// Queues an encoded packet for this client's writer task.
    ///
    /// Returns false if the writer has already gone away; the reader side of
    /// the same connection will observe the failure and clean up.
    pub fn send(&self, packet: &Packet) -> bool {
        if self.outbound.send(packet.encode()).is_err() {
            debug!("Dropping packet for closed connection {}", self.identity);
            return false;
        }
        true
    }
}

/// Manages all connected clients.
///
/// Enforces the server capacity and offers point-to-point and broadcast
/// delivery keyed by identity.
#[derive(Debug)]
pub struct ClientManager {
    clients: HashMap<Identity, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a client. Returns false if the server is at capacity or the
    /// identity is already taken.
    pub fn add_client(&mut self, client: Client) -> bool {
        if self.is_full() || self.clients.contains_key(&client.identity) {
            return false;
        }

        info!("Client {} connected from {}", client.identity, client.addr);
        self.clients.insert(client.identity, client);
        true
    }

    /// Removes a client, dropping its outbound queue so the writer task ends.
    pub fn remove_client(&mut self, identity: &Identity) -> Option<Client> {
        let removed = self.clients.remove(identity);
        if let Some(client) = &removed {
            info!("Client {} disconnected", client.identity);
        }
        removed
    }

    pub fn send_to(&self, identity: &Identity, packet: &Packet) -> bool {
        self.clients
            .get(identity)
            .map(|client| client.send(packet))
            .unwrap_or(false)
    }

    /// Sends `packet` to every client except `exclude`.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<Identity>) {
        let bytes = packet.encode();
        for (identity, client) in &self.clients {
            if Some(*identity) == exclude {
                continue;
            }

            if client.outbound.send(bytes.clone()).is_err() {
                debug!("Dropping broadcast for closed connection {}", identity);
            }
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.clients.contains_key(identity)
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
