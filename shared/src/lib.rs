//! Wire protocol and data types shared by the game server and client.
//!
//! Every integer on the wire is fixed-width, unsigned and big-endian. A packet
//! is framed as `kind:u16 | length:u32 | payload`, and the server only ever
//! sends packets to clients wrapped in an [`EmbeddedPacket`] carrying the
//! identity of the player they concern.

pub mod error;
pub mod identity;
pub mod packet;
pub mod player;
pub mod token;

pub use error::{AddressError, PacketError};
pub use identity::Identity;
pub use packet::{EmbeddedPacket, Packet, PacketKind, RawPacket};
pub use player::{check_collision, PlayerAttributes, Rect};

/// Port used when an address or token does not carry one.
pub const DEFAULT_PORT: u16 = 7371;
/// Playfield width and height.
pub const DEFAULT_BOUNDS: (u16, u16) = (720, 480);
/// Width and height of every player.
pub const PLAYER_SIZE: (u8, u8) = (32, 32);
/// Pending connection backlog of the server listener.
pub const BACKLOG: u32 = 16;
