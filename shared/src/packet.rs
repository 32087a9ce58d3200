//! Binary packet codec.
//!
//! A frame is `kind:u16 | length:u32 | payload[length]`, all big-endian. A
//! [`RawPacket`] is a validated frame whose payload has not been interpreted
//! yet; [`RawPacket::specialize`] turns it into a typed [`Packet`].

use crate::error::PacketError;
use crate::identity::Identity;
use crate::player::PlayerAttributes;
use crate::PLAYER_SIZE;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the `kind | length` header.
pub const HEADER_LEN: usize = 6;
/// Largest payload accepted from the wire.
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024;
/// Largest payload a client may send. Forwarding wraps it with an identity
/// and a second header, and the wrapped form must still fit
/// [`MAX_PAYLOAD_LEN`].
pub const MAX_INBOUND_PAYLOAD_LEN: u32 = MAX_PAYLOAD_LEN - (IDENTITY_LEN + HEADER_LEN) as u32;

const IDENTITY_LEN: usize = 16;
const JOIN_LEN: usize = 9;
const JOIN_LEN_WITHOUT_SIZE: usize = 7;
const POSITION_LEN: usize = 4;

/// Packet kinds. The ordinals are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    Embedded = 1,
    Join = 2,
    Leave = 3,
    Position = 4,
    Message = 5,
}

impl TryFrom<u16> for PacketKind {
    type Error = PacketError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketKind::Embedded),
            2 => Ok(PacketKind::Join),
            3 => Ok(PacketKind::Leave),
            4 => Ok(PacketKind::Position),
            5 => Ok(PacketKind::Message),
            other => Err(PacketError::malformed(format!(
                "unknown packet kind {other}"
            ))),
        }
    }
}

/// A framed packet: kind, declared length and an uninterpreted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    kind: PacketKind,
    length: u32,
    payload: Vec<u8>,
}

impl RawPacket {
    /// Builds a packet, failing if `payload` is not exactly `length` bytes.
    pub fn new(kind: PacketKind, length: u32, payload: Vec<u8>) -> Result<Self, PacketError> {
        if payload.len() != length as usize {
            return Err(PacketError::malformed(format!(
                "packet length mismatch ({} != {})",
                length,
                payload.len()
            )));
        }

        Ok(Self {
            kind,
            length,
            payload,
        })
    }

    fn from_payload(kind: PacketKind, payload: Vec<u8>) -> Self {
        Self {
            kind,
            length: payload.len() as u32,
            payload,
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&(self.kind as u16).to_be_bytes());
        bytes.extend_from_slice(&self.length.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decodes exactly one packet occupying the whole of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::malformed(format!(
                "packet too short ({} bytes)",
                bytes.len()
            )));
        }

        let (kind, length) = parse_header(&bytes[..HEADER_LEN]);
        let kind = PacketKind::try_from(kind)?;
        Self::new(kind, length, bytes[HEADER_LEN..].to_vec())
    }

    /// Reads one frame from a byte stream, accepting payloads up to
    /// [`MAX_PAYLOAD_LEN`].
    ///
    /// End of stream anywhere inside the frame is [`PacketError::TransportClosed`].
    /// Unknown kinds and oversized lengths are [`PacketError::Malformed`]; their
    /// payload is consumed first so the stream stays on a frame boundary.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, PacketError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        Self::read_limited(reader, MAX_PAYLOAD_LEN).await
    }

    /// Like [`RawPacket::read_from`], with a caller-chosen payload limit.
    pub async fn read_limited<R>(reader: &mut R, max_payload_len: u32) -> Result<Self, PacketError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; HEADER_LEN];
        read_full(reader, &mut header).await?;
        let (kind, length) = parse_header(&header);

        if length > max_payload_len {
            skip(reader, length).await?;
            return Err(PacketError::malformed(format!(
                "packet too large ({length} > {max_payload_len})"
            )));
        }

        let mut payload = vec![0u8; length as usize];
        read_full(reader, &mut payload).await?;

        let kind = PacketKind::try_from(kind)?;
        Self::new(kind, length, payload)
    }

    /// Interprets the payload according to the packet kind.
    pub fn specialize(&self) -> Result<Packet, PacketError> {
        let payload = self.payload.as_slice();

        match self.kind {
            PacketKind::Embedded => {
                if payload.len() < IDENTITY_LEN + HEADER_LEN {
                    return Err(PacketError::malformed(format!(
                        "embedded packet too short ({} bytes)",
                        payload.len()
                    )));
                }

                let mut identity = [0u8; IDENTITY_LEN];
                identity.copy_from_slice(&payload[..IDENTITY_LEN]);
                let inner = RawPacket::decode(&payload[IDENTITY_LEN..])?;

                Ok(Packet::Embedded(EmbeddedPacket {
                    identity: Identity::from_bytes(identity),
                    inner,
                }))
            }
            PacketKind::Join => {
                let size = match payload.len() {
                    JOIN_LEN => (payload[7], payload[8]),
                    JOIN_LEN_WITHOUT_SIZE => PLAYER_SIZE,
                    other => {
                        return Err(PacketError::malformed(format!(
                            "join packet has {other} bytes"
                        )))
                    }
                };

                Ok(Packet::Join(PlayerAttributes {
                    color: (payload[0], payload[1], payload[2]),
                    position: (
                        u16::from_be_bytes([payload[3], payload[4]]),
                        u16::from_be_bytes([payload[5], payload[6]]),
                    ),
                    size,
                }))
            }
            PacketKind::Leave => {
                if !payload.is_empty() {
                    return Err(PacketError::malformed(format!(
                        "leave packet has {} bytes",
                        payload.len()
                    )));
                }

                Ok(Packet::Leave)
            }
            PacketKind::Position => {
                if payload.len() != POSITION_LEN {
                    return Err(PacketError::malformed(format!(
                        "position packet has {} bytes",
                        payload.len()
                    )));
                }

                Ok(Packet::Position {
                    x: u16::from_be_bytes([payload[0], payload[1]]),
                    y: u16::from_be_bytes([payload[2], payload[3]]),
                })
            }
            PacketKind::Message => String::from_utf8(payload.to_vec())
                .map(Packet::Message)
                .map_err(|e| PacketError::malformed(format!("message is not utf-8: {e}"))),
        }
    }
}

fn parse_header(header: &[u8]) -> (u16, u32) {
    let kind = u16::from_be_bytes([header[0], header[1]]);
    let length = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    (kind, length)
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), PacketError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(PacketError::TransportClosed)
        }
        Err(e) => Err(PacketError::Io(e)),
    }
}

async fn skip<R>(reader: &mut R, length: u32) -> Result<(), PacketError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut limited = (&mut *reader).take(u64::from(length));
    let skipped = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
    debug!("skipped {} payload bytes", skipped);

    if skipped < u64::from(length) {
        return Err(PacketError::TransportClosed);
    }
    Ok(())
}

/// Wraps another packet with the identity of the player it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPacket {
    identity: Identity,
    inner: RawPacket,
}

impl EmbeddedPacket {
    pub fn wrap(identity: Identity, inner: &Packet) -> Self {
        Self {
            identity,
            inner: inner.to_raw(),
        }
    }

    pub fn unwrap(self) -> (Identity, RawPacket) {
        (self.identity, self.inner)
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }
}

/// A packet whose payload has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Embedded(EmbeddedPacket),
    Join(PlayerAttributes),
    Leave,
    Position { x: u16, y: u16 },
    Message(String),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Embedded(_) => PacketKind::Embedded,
            Packet::Join(_) => PacketKind::Join,
            Packet::Leave => PacketKind::Leave,
            Packet::Position { .. } => PacketKind::Position,
            Packet::Message(_) => PacketKind::Message,
        }
    }

    pub fn to_raw(&self) -> RawPacket {
        let payload = match self {
            Packet::Embedded(embedded) => {
                let mut payload = embedded.identity.to_bytes().to_vec();
                payload.extend_from_slice(&embedded.inner.encode());
                payload
            }
            Packet::Join(attributes) => {
                let (r, g, b) = attributes.color;
                let (x, y) = attributes.position;
                let (w, h) = attributes.size;

                let mut payload = vec![r, g, b];
                payload.extend_from_slice(&x.to_be_bytes());
                payload.extend_from_slice(&y.to_be_bytes());
                payload.extend_from_slice(&[w, h]);
                payload
            }
            Packet::Leave => Vec::new(),
            Packet::Position { x, y } => {
                let mut payload = x.to_be_bytes().to_vec();
                payload.extend_from_slice(&y.to_be_bytes());
                payload
            }
            Packet::Message(message) => message.as_bytes().to_vec(),
        };

        RawPacket::from_payload(self.kind(), payload)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_raw().encode()
    }

    /// Wraps this packet in an [`EmbeddedPacket`] attributed to `identity`.
    pub fn embed(&self, identity: Identity) -> Packet {
        Packet::Embedded(EmbeddedPacket::wrap(identity, self))
    }
}
