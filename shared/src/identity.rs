use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit token naming one connected player.
///
/// The all-zero value is reserved for "the local player" when the server
/// describes a client to itself; it is never assigned to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Uuid);

impl Identity {
    /// The reserved identity of the local/main player.
    pub const MAIN: Identity = Identity(Uuid::nil());

    /// Generates a fresh random identity. Version 4 UUIDs always carry
    /// version bits, so the result is never [`Identity::MAIN`].
    pub fn generate() -> Self {
        Identity(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Identity(Uuid::from_bytes(bytes))
    }

    /// Big-endian byte representation used on the wire.
    pub fn to_bytes(self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    pub fn is_main(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<u128> for Identity {
    fn from(value: u128) -> Self {
        Identity(Uuid::from_u128(value))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
