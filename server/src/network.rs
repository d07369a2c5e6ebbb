//! Server network layer: TCP transport and the fixed-rate main loop
//!
//! Every connection gets a reader task and a writer task. Reader tasks
//! forward decoded packets to the main loop through a channel, so the
//! session sees connect, disconnect and packet callbacks one at a time and
//! in arrival order, interleaved with its ticks.

use crate::client_manager::ClientManager;
use log::{debug, error, info, warn};
use shared::frame::{read_frame, write_frame};
use shared::Packet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

/// Upper bound on a single tick's delta time, in seconds
const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

/// Time since the last tick in seconds, capped at `MAX_DELTA_TIME`.
fn capped_dt(elapsed: Duration) -> f32 {
    let dt = elapsed.as_secs_f32();
    if dt > MAX_DELTA_TIME {
        debug!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, MAX_DELTA_TIME);
        MAX_DELTA_TIME
    } else {
        dt
    }
}

/// Events sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted { stream: TcpStream, addr: SocketAddr },
    PacketReceived { client_id: u32, packet: Packet },
    ClientDisconnected { client_id: u32 },
}

/// Outbound commands produced by the session and executed by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket { client_id: u32, packet: Packet },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
    Kick { client_id: u32 },
}

/// Callbacks the transport drives. Implemented by the game session.
pub trait SessionHandler {
    fn on_connected(&mut self, client_id: u32);
    fn on_disconnected(&mut self, client_id: u32);
    fn on_packet_received(&mut self, client_id: u32, packet: Packet);
    /// Advances the session by `dt` seconds.
    fn tick(&mut self, dt: f32);
    /// Hands over everything queued for sending since the last call.
    fn drain_outgoing(&mut self) -> Vec<GameMessage>;
}

/// Authoritative server: owns the listener, the connection registry and the session
pub struct Server<H: SessionHandler> {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    handler: H,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl<H: SessionHandler> Server<H> {
    pub async fn bind(
        addr: &str,
        tick_duration: Duration,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(),
            handler,
            tick_duration,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Could not disable Nagle for {}: {}", addr, e);
                        }
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the reader and writer tasks of one connection
    fn spawn_connection(
        &self,
        client_id: u32,
        stream: TcpStream,
        mut outbound: mpsc::UnboundedReceiver<Packet>,
        mut closed: oneshot::Receiver<()>,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut closed => {
                        debug!("Reader for client {} stopped by server", client_id);
                        return;
                    }
                    frame = read_frame(&mut reader) => match frame {
                        Ok(Some(bytes)) => match Packet::decode(&bytes) {
                            Ok(packet) => {
                                if server_tx
                                    .send(ServerMessage::PacketReceived { client_id, packet })
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            Err(e) => warn!("Dropping malformed packet from client {}: {}", client_id, e),
                        },
                        Ok(None) => break,
                        Err(e) => {
                            debug!("Read from client {} failed: {}", client_id, e);
                            break;
                        }
                    },
                }
            }
            let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
        });

        tokio::spawn(async move {
            while let Some(packet) = outbound.recv().await {
                if let Err(e) = write_frame(&mut writer, &packet).await {
                    debug!("Write to client {} failed: {}", client_id, e);
                    break;
                }
            }
            // Queue closed: the client was removed or kicked. The socket
            // closes once the reader has dropped its half too.
            let _ = writer.shutdown().await;
        });
    }

    /// Executes everything the session queued
    fn flush_outgoing(&mut self) {
        for message in self.handler.drain_outgoing() {
            match message {
                GameMessage::SendPacket { client_id, packet } => {
                    self.clients.send_to(client_id, packet);
                }
                GameMessage::BroadcastPacket { packet, exclude } => {
                    self.clients.broadcast(&packet, exclude);
                }
                GameMessage::Kick { client_id } => {
                    info!("Kicking client {}", client_id);
                    self.clients.remove_client(&client_id);
                }
            }
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Accepted { stream, addr } => {
                let (sender, receiver) = mpsc::unbounded_channel();
                let (closer, closed) = oneshot::channel();
                let client_id = self.clients.add_client(addr, sender, closer);
                self.spawn_connection(client_id, stream, receiver, closed);
                self.handler.on_connected(client_id);
            }
            ServerMessage::PacketReceived { client_id, packet } => {
                if self.clients.contains(&client_id) {
                    self.handler.on_packet_received(client_id, packet);
                }
            }
            ServerMessage::ClientDisconnected { client_id } => {
                // Kicked clients were already removed and never joined the session.
                if self.clients.remove_client(&client_id) {
                    self.handler.on_disconnected(client_id);
                }
            }
        }
        self.flush_outgoing();
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = capped_dt(now.duration_since(last_tick));
                    last_tick = now;

                    self.handler.tick(dt);
                    self.flush_outgoing();

                    tick += 1;
                    if tick % 600 == 0 && !self.clients.is_empty() {
                        debug!("Tick {}: clients {:?}, {:.1}Hz", tick, self.clients.client_ids(), 1.0 / dt);
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[derive(Default)]
    struct RecordingSession {
        events: Vec<String>,
        outgoing: Vec<GameMessage>,
    }

    impl SessionHandler for RecordingSession {
        fn on_connected(&mut self, client_id: u32) {
            self.events.push(format!("connected {}", client_id));
            self.outgoing.push(GameMessage::SendPacket {
                client_id,
                packet: Packet::Server {
                    message: "welcome".to_string(),
                },
            });
        }

        fn on_disconnected(&mut self, client_id: u32) {
            self.events.push(format!("disconnected {}", client_id));
        }

        fn on_packet_received(&mut self, client_id: u32, packet: Packet) {
            self.events.push(format!("{} sent {:?}", client_id, packet.kind()));
        }

        fn tick(&mut self, _dt: f32) {}

        fn drain_outgoing(&mut self) -> Vec<GameMessage> {
            std::mem::take(&mut self.outgoing)
        }
    }

    #[tokio::test]
    async fn test_bind_reports_ephemeral_port() {
        let server = Server::bind(
            "127.0.0.1:0",
            Duration::from_millis(16),
            RecordingSession::default(),
        )
        .await
        .unwrap();

        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_packets_from_unknown_clients_are_ignored() {
        let mut server = Server::bind(
            "127.0.0.1:0",
            Duration::from_millis(16),
            RecordingSession::default(),
        )
        .await
        .unwrap();

        server.handle_message(ServerMessage::PacketReceived {
            client_id: 5,
            packet: Packet::RequestPeers,
        });
        server.handle_message(ServerMessage::ClientDisconnected { client_id: 5 });

        assert!(server.handler.events.is_empty());
    }

    #[tokio::test]
    async fn test_accepted_connection_reaches_session() {
        let mut server = Server::bind(
            "127.0.0.1:0",
            Duration::from_millis(16),
            RecordingSession::default(),
        )
        .await
        .unwrap();
        let addr = server.local_addr();
        let listener = server.listener.take().unwrap();

        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut client = client.unwrap();
        let (stream, peer) = accepted.unwrap();

        server.handle_message(ServerMessage::Accepted { stream, addr: peer });
        assert_eq!(server.handler.events, vec!["connected 1".to_string()]);
        assert_eq!(server.clients.len(), 1);

        let bytes = read_frame(&mut client).await.unwrap().unwrap();
        assert_eq!(
            Packet::decode(&bytes).unwrap(),
            Packet::Server {
                message: "welcome".to_string()
            }
        );
    }

    #[test]
    fn test_delta_time_is_capped() {
        assert_approx_eq!(capped_dt(Duration::from_millis(20)), 0.02);
        assert_approx_eq!(capped_dt(Duration::from_millis(50)), MAX_DELTA_TIME);
        assert_eq!(capped_dt(Duration::from_secs(3)), MAX_DELTA_TIME);
        assert_eq!(capped_dt(Duration::ZERO), 0.0);
    }

    #[tokio::test]
    async fn test_removed_client_socket_is_closed() {
        let mut server = Server::bind(
            "127.0.0.1:0",
            Duration::from_millis(16),
            RecordingSession::default(),
        )
        .await
        .unwrap();
        let addr = server.local_addr();
        let listener = server.listener.take().unwrap();

        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut client = client.unwrap();
        let (stream, peer) = accepted.unwrap();
        server.handle_message(ServerMessage::Accepted { stream, addr: peer });
        assert!(read_frame(&mut client).await.unwrap().is_some());

        assert!(server.clients.remove_client(&1));
        let eof = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut client))
            .await
            .unwrap();
        assert!(matches!(eof, Ok(None)));

        // Both halves are gone, so the peer's writes are eventually refused.
        let mut refused = false;
        for _ in 0..50 {
            if write_frame(&mut client, &Packet::PlayerReady { ready: true })
                .await
                .is_err()
            {
                refused = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(refused);
    }

    #[test]
    fn test_game_message_broadcast() {
        let msg = GameMessage::BroadcastPacket {
            packet: Packet::BallReset,
            exclude: Some(5),
        };

        match msg {
            GameMessage::BroadcastPacket { packet, exclude } => {
                assert_eq!(exclude, Some(5));
                assert_eq!(packet, Packet::BallReset);
            }
            _ => panic!("Unexpected message type"),
        }
    }
}
