//! Server network layer: TCP accept loop and per-connection tasks.

use crate::filters::{self, PacketFilter};
use crate::game::GameState;
use crate::room::Room;
use log::{debug, error, info, warn};
use shared::packet::MAX_INBOUND_PAYLOAD_LEN;
use shared::{Identity, PacketError, RawPacket};
use shared::{BACKLOG, DEFAULT_BOUNDS, DEFAULT_PORT, PLAYER_SIZE};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// Startup configuration of the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Playfield width and height; every position is validated against it.
    pub bounds: (u16, u16),
    pub player_size: (u8, u8),
    /// Maximum concurrent players. Defaults to [`GameState::capacity`].
    pub max_players: Option<usize>,
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_PORT),
            bounds: DEFAULT_BOUNDS,
            player_size: PLAYER_SIZE,
            max_players: None,
            backlog: BACKLOG,
        }
    }
}

/// Authoritative game server.
pub struct Server {
    listener: TcpListener,
    room: Arc<Mutex<Room>>,
    filters: Vec<PacketFilter>,
}

impl Server {
    /// Binds the listener and prepares an empty room with the default filter chain.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let (width, height) = config.bounds;
        if width < u16::from(config.player_size.0) || height < u16::from(config.player_size.1) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "playfield {}x{} is smaller than a player ({}x{})",
                    width, height, config.player_size.0, config.player_size.1
                ),
            ));
        }

        let socket = if config.address.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(config.address)?;
        let listener = socket.listen(config.backlog)?;

        info!(
            "binding on address {} ({})",
            listener.local_addr()?,
            config.backlog
        );

        let game = GameState::new(config.bounds, config.player_size);
        let max_players = config.max_players.unwrap_or_else(|| game.capacity());

        Ok(Server {
            listener,
            room: Arc::new(Mutex::new(Room::new(game, max_players))),
            filters: filters::default_filters(config.bounds),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle on the room, for inspection.
    pub fn room(&self) -> Arc<Mutex<Room>> {
        Arc::clone(&self.room)
    }

    /// Appends a filter to the end of the chain.
    pub fn add_filter(&mut self, filter: PacketFilter) {
        self.filters.push(filter);
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self) -> io::Result<()> {
        let filters = Arc::new(self.filters);
        info!("game server started");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let room = Arc::clone(&self.room);
                    let filters = Arc::clone(&filters);
                    tokio::spawn(handle_connection(stream, addr, room, filters));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Drives one connection from handshake to cleanup.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    room: Arc<Mutex<Room>>,
    filters: Arc<Vec<PacketFilter>>,
) {
    let identity = Identity::generate();
    info!("new connection from {} ({})", addr, identity);

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }

    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let joined = {
        let mut room = room.lock().await;
        let mut rng = rand::thread_rng();
        room.join(identity, addr, outbound_tx, &mut rng)
    };
    if joined.is_none() {
        return;
    }

    serve(reader, writer, outbound_rx, identity, &room, &filters).await;
}

/// Runs the reader and writer of a joined player until either side fails,
/// then removes the player from the room.
async fn serve<R, W>(
    reader: R,
    writer: W,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    identity: Identity,
    room: &Mutex<Room>,
    filters: &[PacketFilter],
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer = tokio::spawn(write_outbound(writer, outbound, identity));

    tokio::select! {
        _ = receive_packets(reader, identity, room, filters) => {}
        _ = &mut writer => debug!("writer for ({}) stopped", identity),
    }

    room.lock().await.leave(identity);
    info!("connection closed ({})", identity);
}

/// Reads packets until the connection fails, feeding each through the room.
async fn receive_packets<R>(
    mut reader: R,
    identity: Identity,
    room: &Mutex<Room>,
    filters: &[PacketFilter],
) where
    R: AsyncRead + Unpin,
{
    loop {
        let read = RawPacket::read_limited(&mut reader, MAX_INBOUND_PAYLOAD_LEN).await;
        let packet = match read.and_then(|raw| raw.specialize()) {
            Ok(packet) => packet,
            Err(PacketError::Malformed(reason)) => {
                warn!("discarding malformed packet from ({}): {}", identity, reason);
                continue;
            }
            Err(PacketError::TransportClosed) => {
                debug!("peer ({}) closed the connection", identity);
                return;
            }
            Err(e) => {
                error!("Error receiving packet from ({}): {}", identity, e);
                return;
            }
        };

        debug!("received packet from ({}) {:?}", identity, packet);

        let mut room = room.lock().await;
        room.handle_packet(identity, packet, filters);
    }
}

/// Writes queued packets to the socket until the queue is dropped.
async fn write_outbound<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    identity: Identity,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            error!("Failed to send to client {}: {}", identity, e);
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Failed to shut down connection {}: {}", identity, e);
    }
}
