use crate::callbacks::{CallbackChain, CallbackId, ClientCallback};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use shared::{AddressError, Packet, PacketError, RawPacket};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("client already started")]
    AlreadyStarted,
}

/// Cloneable handle that enqueues packets on a client's outbound queue.
#[derive(Debug, Clone)]
pub struct PacketSender {
    outbound: mpsc::UnboundedSender<Packet>,
}

impl PacketSender {
    /// Enqueues a packet. Never blocks; packets leave in submission order.
    pub fn send(&self, packet: Packet) {
        if self.outbound.send(packet).is_err() {
            debug!("outbound queue closed, dropping packet");
        }
    }

    pub fn update_position(&self, x: u16, y: u16) {
        self.send(Packet::Position { x, y });
    }
}

/// TCP client used to talk to the game server.
///
/// Packets queued with [`Client::send`] are written by an outbound task in
/// submission order. An inbound task decodes what the server sends, unwraps
/// the sender identity and threads each packet through the registered
/// callbacks. Packets may be queued before [`Client::start`]; they go out
/// once the connection is up.
pub struct Client {
    address: SocketAddr,
    sender: PacketSender,
    outbound_rx: Option<mpsc::UnboundedReceiver<Packet>>,
    callbacks: Arc<Mutex<CallbackChain>>,
    connection: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(address: SocketAddr) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        Client {
            address,
            sender: PacketSender { outbound },
            outbound_rx: Some(outbound_rx),
            callbacks: Arc::new(Mutex::new(CallbackChain::new())),
            connection: None,
        }
    }

    /// Connects and spawns the outbound and inbound tasks.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        let outbound_rx = self.outbound_rx.take().ok_or(ClientError::AlreadyStarted)?;

        let stream = match TcpStream::connect(self.address).await {
            Ok(stream) => stream,
            Err(source) => {
                self.outbound_rx = Some(outbound_rx);
                return Err(ClientError::Connect {
                    addr: self.address,
                    source,
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        info!("Connected to {}", self.address);

        let (reader, writer) = stream.into_split();
        let callbacks = Arc::clone(&self.callbacks);

        self.connection = Some(tokio::spawn(async move {
            let mut inbound = tokio::spawn(receive_packets(reader, callbacks));
            let mut outbound = tokio::spawn(send_packets(writer, outbound_rx));

            let remaining = tokio::select! {
                _ = &mut inbound => outbound,
                _ = &mut outbound => inbound,
            };
            remaining.abort();
            let _ = remaining.await;

            info!("connection closed.");
        }));

        Ok(())
    }

    /// Enqueues a packet for the server.
    pub fn send(&self, packet: Packet) {
        self.sender.send(packet);
    }

    pub fn update_position(&self, x: u16, y: u16) {
        self.sender.update_position(x, y);
    }

    pub fn sender(&self) -> PacketSender {
        self.sender.clone()
    }

    /// Appends a callback to the end of the chain.
    ///
    /// Callbacks run on the inbound task while the chain is locked, so they
    /// must not add or remove callbacks themselves.
    pub fn add_callback(&self, callback: ClientCallback) -> CallbackId {
        self.callbacks.lock().add(callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.callbacks.lock().remove(id)
    }

    pub fn is_running(&self) -> bool {
        self.connection
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Waits until the connection has ended.
    pub async fn closed(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.await {
                error!("Connection task failed: {}", e);
            }
        }
    }
}

async fn receive_packets(mut reader: OwnedReadHalf, callbacks: Arc<Mutex<CallbackChain>>) {
    loop {
        let read = RawPacket::read_from(&mut reader).await;
        let packet = match read.and_then(|raw| raw.specialize()) {
            Ok(packet) => packet,
            Err(PacketError::Malformed(reason)) => {
                warn!("discarding malformed packet: {}", reason);
                continue;
            }
            Err(PacketError::TransportClosed) => return,
            Err(e) => {
                error!("Error receiving packet: {}", e);
                return;
            }
        };

        let Packet::Embedded(embedded) = packet else {
            debug!("ignoring bare {:?} packet", packet.kind());
            continue;
        };

        let (identity, inner) = embedded.unwrap();
        let packet = match inner.specialize() {
            Ok(packet) => packet,
            Err(e) => {
                warn!("discarding malformed packet from ({}): {}", identity, e);
                continue;
            }
        };

        debug!("received packet from ({}) {:?}", identity, packet);
        callbacks.lock().dispatch(identity, packet);
    }
}

async fn send_packets(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Packet>) {
    while let Some(packet) = outbound.recv().await {
        if let Err(e) = writer.write_all(&packet.encode()).await {
            error!("Error sending packet: {}", e);
            return;
        }
        debug!("sent packet {:?}", packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::on_player_move;
    use shared::Identity;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = Client::new(addr);
        let result = client.start().await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn test_start_twice() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = Client::new(listener.local_addr().unwrap());

        client.start().await.unwrap();
        assert!(matches!(client.start().await, Err(ClientError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_queued_packets_are_sent_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = Client::new(listener.local_addr().unwrap());

        client.update_position(1, 1);
        client.start().await.unwrap();
        client.update_position(2, 2);
        client.sender().update_position(3, 3);

        let (mut server_side, _) = listener.accept().await.unwrap();
        for expected in 1..=3 {
            let raw = timeout(Duration::from_secs(2), RawPacket::read_from(&mut server_side))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(
                raw.specialize().unwrap(),
                Packet::Position {
                    x: expected,
                    y: expected
                }
            );
        }
    }

    #[tokio::test]
    async fn test_inbound_dispatch_skips_bare_and_malformed_packets() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = Client::new(listener.local_addr().unwrap());

        let (tx, mut rx) = mpsc::unbounded_channel();
        client.add_callback(on_player_move(move |identity, position| {
            let _ = tx.send((identity, position));
        }));
        client.start().await.unwrap();

        let (mut server_side, _) = listener.accept().await.unwrap();
        let sender = Identity::generate();

        // A bare packet, a frame with an unknown kind, then a valid update.
        server_side
            .write_all(&Packet::Position { x: 9, y: 9 }.encode())
            .await
            .unwrap();
        server_side.write_all(&[0, 42, 0, 0, 0, 1, 0]).await.unwrap();
        server_side
            .write_all(&Packet::Position { x: 4, y: 5 }.embed(sender).encode())
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, (sender, (4, 5)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_server_close_ends_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = Client::new(listener.local_addr().unwrap());
        client.start().await.unwrap();

        let (server_side, _) = listener.accept().await.unwrap();
        drop(server_side);

        timeout(Duration::from_secs(2), client.closed()).await.unwrap();
        assert!(!client.is_running());
    }
}
