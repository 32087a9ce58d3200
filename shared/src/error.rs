use std::io;
use thiserror::Error;

/// Failure while framing or interpreting a packet.
#[derive(Debug, Error)]
pub enum PacketError {
    /// The bytes do not describe a valid packet. Recoverable: the caller
    /// skips the packet and keeps the connection.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// The peer closed the stream.
    #[error("transport closed by peer")]
    TransportClosed,

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl PacketError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        PacketError::Malformed(reason.into())
    }

    /// Whether the error ends the connection it came from.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PacketError::Malformed(_))
    }
}

/// Failure while turning user input into a network address.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid ip address: {0:?}")]
    InvalidIp(String),

    #[error("invalid port: {0:?} is not in range (0, 65535]")]
    InvalidPort(String),

    #[error("invalid server token: {0:?}")]
    InvalidToken(String),

    #[error("failed to determine local ip address: {0}")]
    LocalIp(#[from] io::Error),
}
