//! Registry of open client connections.
//!
//! The client manager owns the outbound queue of every connection and knows
//! how to address "one client" and "everyone except the sender". It does not
//! decide who may play; the game session does that and asks for a kick when
//! a connection must be dropped.

use log::{debug, info};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// An open connection and the queue feeding its writer task
#[derive(Debug)]
pub struct Client {
    /// Unique connection id assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Packets queued here are written to the socket in order
    sender: mpsc::UnboundedSender<Packet>,
    /// Fired on removal to stop the reader task and release the read half
    closer: oneshot::Sender<()>,
}

impl Client {
    pub fn new(
        id: u32,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
        closer: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            closer,
        }
    }

    /// Queues a packet for this client. Fire-and-forget: returns false only
    /// when the writer task has already gone away.
    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet).is_ok()
    }

    /// Stops the reader task. The writer still flushes what is queued, then
    /// the socket closes once both halves are gone.
    pub fn close(self) {
        let _ = self.closer.send(());
    }
}

/// Tracks connections by id and routes outbound packets.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    /// Next id handed out; ids are never reused within a process
    next_client_id: u32,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a new connection and returns its id.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
        closer: oneshot::Sender<()>,
    ) -> u32 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender, closer));
        client_id
    }

    /// Forgets a connection and closes it: the reader task stops and
    /// dropping the queue lets the writer task shut the socket down.
    /// Returns false if the client was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} ({}) removed after {:.1}s",
                client.id,
                client.addr,
                client.connected_at.elapsed().as_secs_f32()
            );
            client.close();
            true
        } else {
            false
        }
    }

    pub fn contains(&self, client_id: &u32) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Sends to a single client.
    pub fn send_to(&self, client_id: u32, packet: Packet) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(packet),
            None => {
                debug!("Dropping {:?} for unknown client {}", packet.kind(), client_id);
                false
            }
        }
    }

    /// Sends to every client, optionally skipping one.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<u32>) {
        for client in self.clients.values() {
            if Some(client.id) == exclude {
                continue;
            }
            client.send(packet.clone());
        }
    }

    pub fn client_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
