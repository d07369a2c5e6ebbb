//! Client connection running on its own thread.
//!
//! The render loop must never wait on the socket, so the connection lives on
//! a background thread with a single-threaded tokio runtime. Packets to send
//! and events received cross the thread boundary through unbounded channels.

use log::{debug, info, warn};
use shared::frame::{read_frame, write_frame};
use shared::Packet;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    PacketReceived(Packet),
    Disconnected { reason: String },
}

pub struct NetworkClient {
    outbound: mpsc::UnboundedSender<Packet>,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
    connected: bool,
}

impl NetworkClient {
    /// Starts connecting in the background. Progress is reported through
    /// [`NetworkClient::poll_events`].
    pub fn connect(addr: SocketAddr) -> Result<Self, Box<dyn std::error::Error>> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || runtime.block_on(run_connection(addr, outbound_rx, events_tx)))?;

        Ok(Self {
            outbound,
            events,
            connected: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Queues a packet. Fire-and-forget: false only if the connection is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }

    /// Everything that happened since the last call, without blocking.
    pub fn poll_events(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.track(&event);
            events.push(event);
        }
        events
    }

    /// Waits for the next event. Used by tests and headless tools.
    pub async fn next_event(&mut self) -> Option<NetworkEvent> {
        let event = self.events.recv().await?;
        self.track(&event);
        Some(event)
    }

    fn track(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::Connected => self.connected = true,
            NetworkEvent::Disconnected { .. } => self.connected = false,
            NetworkEvent::PacketReceived(_) => {}
        }
    }
}

async fn run_connection(
    addr: SocketAddr,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not connect to {}: {}", addr, e);
            let _ = events.send(NetworkEvent::Disconnected {
                reason: e.to_string(),
            });
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle: {}", e);
    }
    info!("Connected to {}", addr);
    let _ = events.send(NetworkEvent::Connected);

    let (mut reader, mut writer) = stream.into_split();

    let writer_task = tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            if let Err(e) = write_frame(&mut writer, &packet).await {
                warn!("Send failed: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some(bytes)) => match Packet::decode(&bytes) {
                Ok(packet) => {
                    if events.send(NetworkEvent::PacketReceived(packet)).is_err() {
                        break "client closed".to_string();
                    }
                }
                Err(e) => warn!("Dropping malformed packet from server: {}", e),
            },
            Ok(None) => break "server closed the connection".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    info!("Disconnected: {}", reason);
    writer_task.abort();
    let _ = events.send(NetworkEvent::Disconnected { reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_exchange_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = NetworkClient::connect(addr).unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();

        assert_eq!(client.next_event().await, Some(NetworkEvent::Connected));
        assert!(client.is_connected());

        write_frame(&mut stream, &Packet::GameStarted).await.unwrap();
        assert_eq!(
            client.next_event().await,
            Some(NetworkEvent::PacketReceived(Packet::GameStarted))
        );

        assert!(client.send(Packet::PlayerReady { ready: true }));
        let bytes = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(
            Packet::decode(&bytes).unwrap(),
            Packet::PlayerReady { ready: true }
        );

        drop(stream);
        assert!(matches!(
            client.next_event().await,
            Some(NetworkEvent::Disconnected { .. })
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_refused_connection_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = NetworkClient::connect(addr).unwrap();
        assert!(matches!(
            client.next_event().await,
            Some(NetworkEvent::Disconnected { .. })
        ));
    }
}
