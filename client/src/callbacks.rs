//! Receive callbacks.
//!
//! Every packet the client receives is passed, together with the identity of
//! the player it concerns, through an ordered chain of callbacks. A callback
//! returns the packet to hand it on to the next one, or `None` to consume it.

use shared::{Identity, Packet, PlayerAttributes};

pub type ClientCallback = Box<dyn FnMut(Identity, Packet) -> Option<Packet> + Send>;

/// Handle returned when registering a callback, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

#[derive(Default)]
pub struct CallbackChain {
    next_id: u64,
    callbacks: Vec<(CallbackId, ClientCallback)>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: ClientCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(callback_id, _)| *callback_id != id);
        self.callbacks.len() != before
    }

    /// Threads a packet through the chain in registration order. Returns the
    /// packet if no callback consumed it.
    pub fn dispatch(&mut self, identity: Identity, packet: Packet) -> Option<Packet> {
        let mut packet = packet;
        for (_, callback) in self.callbacks.iter_mut() {
            packet = callback(identity, packet)?;
        }
        Some(packet)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Runs `action` on every join and consumes the packet.
pub fn on_player_join<F>(mut action: F) -> ClientCallback
where
    F: FnMut(Identity, PlayerAttributes) + Send + 'static,
{
    Box::new(move |identity: Identity, packet: Packet| match packet {
        Packet::Join(attributes) => {
            action(identity, attributes);
            None
        }
        other => Some(other),
    })
}

/// Runs `action` on every leave and consumes the packet.
pub fn on_player_leave<F>(mut action: F) -> ClientCallback
where
    F: FnMut(Identity) + Send + 'static,
{
    Box::new(move |identity: Identity, packet: Packet| match packet {
        Packet::Leave => {
            action(identity);
            None
        }
        other => Some(other),
    })
}

/// Runs `action` on every position update and consumes the packet.
pub fn on_player_move<F>(mut action: F) -> ClientCallback
where
    F: FnMut(Identity, (u16, u16)) + Send + 'static,
{
    Box::new(move |identity: Identity, packet: Packet| match packet {
        Packet::Position { x, y } => {
            action(identity, (x, y));
            None
        }
        other => Some(other),
    })
}

/// Runs `action` on every text message and consumes the packet.
pub fn on_message<F>(mut action: F) -> ClientCallback
where
    F: FnMut(Identity, String) + Send + 'static,
{
    Box::new(move |identity: Identity, packet: Packet| match packet {
        Packet::Message(message) => {
            action(identity, message);
            None
        }
        other => Some(other),
    })
}
