//! The shared room: connection registry plus game state.
//!
//! Both live behind a single lock so that a player's connection and its
//! attributes are always added and removed together, and so that spawn
//! placement and collision checks see a consistent snapshot of every player.

use log::{debug, warn};
use rand::Rng;
use shared::packet::MAX_PAYLOAD_LEN;
use shared::{Identity, Packet, PlayerAttributes};
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::client_manager::{Client, ClientManager};
use crate::filters::{self, PacketFilter};
use crate::game::GameState;

#[derive(Debug)]
pub struct Room {
    pub clients: ClientManager,
    pub game: GameState,
}

impl Room {
    pub fn new(game: GameState, max_players: usize) -> Self {
        Self {
            clients: ClientManager::new(max_players),
            game,
        }
    }

    /// Admits a new player and performs the join handshake.
    ///
    /// Everybody already in the room learns about the newcomer first. The
    /// newcomer then receives its own attributes under [`Identity::MAIN`],
    /// followed by one join per existing player. Returns `None` when the room
    /// is full; nothing is registered in that case.
    pub fn join<R: Rng>(
        &mut self,
        identity: Identity,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        rng: &mut R,
    ) -> Option<PlayerAttributes> {
        if self.clients.contains(&identity) {
            warn!("Refusing connection from {}: identity {} already joined", addr, identity);
            return None;
        }
        if self.clients.is_full() {
            warn!("Refusing connection from {}: room is full", addr);
            return None;
        }

        let attributes = self.game.allocate(identity, rng);
        let join = Packet::Join(attributes);

        self.clients.broadcast(&join.embed(identity), None);
        self.clients.add_client(Client::new(identity, addr, outbound));
        self.clients.send_to(&identity, &join.embed(Identity::MAIN));

        for (other, other_attributes) in self.game.players() {
            if *other != identity {
                self.clients
                    .send_to(&identity, &Packet::Join(*other_attributes).embed(*other));
            }
        }

        debug!("player ({}) has joined the server", identity);
        Some(attributes)
    }

    /// Runs the filter chain on a packet from `identity`; if accepted, applies
    /// it to the game state and forwards it to every other player.
    ///
    /// Packets whose forwarded form would exceed [`MAX_PAYLOAD_LEN`] are
    /// dropped, since no client would accept them.
    pub fn handle_packet(
        &mut self,
        identity: Identity,
        packet: Packet,
        filters: &[PacketFilter],
    ) -> bool {
        if !filters::accepts(filters, identity, &packet, &self.game) {
            return false;
        }

        let forwarded = packet.embed(identity);
        if forwarded.to_raw().length() > MAX_PAYLOAD_LEN {
            warn!("dropping {:?} packet from ({}): too large to forward", packet.kind(), identity);
            return false;
        }

        if let Packet::Position { x, y } = packet {
            self.game.apply_position(identity, x, y);
        }

        self.clients.broadcast(&forwarded, Some(identity));
        true
    }

    /// Announces the departure of `identity` to everybody else, then forgets it.
    pub fn leave(&mut self, identity: Identity) -> bool {
        if !self.clients.contains(&identity) {
            return false;
        }

        self.clients.broadcast(&Packet::Leave.embed(identity), Some(identity));
        self.clients.remove_client(&identity);
        self.game.release(&identity);
        true
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.clients.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::packet::MAX_INBOUND_PAYLOAD_LEN;
    use shared::{check_collision, RawPacket, DEFAULT_BOUNDS, PLAYER_SIZE};

    struct TestPlayer {
        identity: Identity,
        attributes: PlayerAttributes,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    impl TestPlayer {
        /// Drains every queued packet as (identity, inner packet) pairs.
        fn received(&mut self) -> Vec<(Identity, Packet)> {
            let mut received = Vec::new();
            while let Ok(bytes) = self.rx.try_recv() {
                let packet = RawPacket::decode(&bytes).unwrap().specialize().unwrap();
                match packet {
                    Packet::Embedded(embedded) => {
                        let (identity, inner) = embedded.unwrap();
                        received.push((identity, inner.specialize().unwrap()));
                    }
                    other => panic!("Server sent a bare packet: {other:?}"),
                }
            }
            received
        }
    }

    fn test_room() -> Room {
        let game = GameState::new(DEFAULT_BOUNDS, PLAYER_SIZE);
        let capacity = game.capacity();
        Room::new(game, capacity)
    }

    fn join(room: &mut Room, rng: &mut StdRng) -> TestPlayer {
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity::generate();
        let attributes = room
            .join(identity, "127.0.0.1:9000".parse().unwrap(), tx, rng)
            .unwrap();
        TestPlayer {
            identity,
            attributes,
            rx,
        }
    }

    fn filters() -> Vec<PacketFilter> {
        filters::default_filters(DEFAULT_BOUNDS)
    }

    #[test]
    fn test_join_handshake_completeness() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(11);

        let mut existing: Vec<TestPlayer> = (0..3).map(|_| join(&mut room, &mut rng)).collect();
        for player in &mut existing {
            player.received();
        }

        let mut newcomer = join(&mut room, &mut rng);
        let received = newcomer.received();

        assert_eq!(received.len(), 4);
        assert_eq!(received[0], (Identity::MAIN, Packet::Join(newcomer.attributes)));

        for player in &existing {
            let joins: Vec<_> = received
                .iter()
                .filter(|(identity, _)| *identity == player.identity)
                .collect();
            assert_eq!(joins.len(), 1);
            assert_eq!(joins[0].1, Packet::Join(player.attributes));
        }

        for player in &mut existing {
            assert_eq!(
                player.received(),
                vec![(newcomer.identity, Packet::Join(newcomer.attributes))]
            );
        }
    }

    #[test]
    fn test_join_refused_when_full() {
        let mut room = Room::new(GameState::new(DEFAULT_BOUNDS, PLAYER_SIZE), 1);
        let mut rng = StdRng::seed_from_u64(2);
        let mut first = join(&mut room, &mut rng);
        first.received();

        let (tx, _rx) = mpsc::unbounded_channel();
        let addr = "127.0.0.1:9001".parse().unwrap();
        let refused = room.join(Identity::generate(), addr, tx, &mut rng);

        assert!(refused.is_none());
        assert_eq!(room.len(), 1);
        assert_eq!(room.game.len(), 1);
        assert!(first.received().is_empty());
    }

    #[test]
    fn test_accepted_position_is_applied_and_forwarded() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = join(&mut room, &mut rng);
        let mut b = join(&mut room, &mut rng);
        a.received();
        b.received();

        // Moving onto the spot it already occupies never collides.
        let (x, y) = a.attributes.position;
        assert!(room.handle_packet(a.identity, Packet::Position { x, y }, &filters()));

        assert_eq!(b.received(), vec![(a.identity, Packet::Position { x, y })]);
        assert!(a.received().is_empty());
    }

    #[test]
    fn test_out_of_bounds_position_is_dropped() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(4);
        let mut a = join(&mut room, &mut rng);
        let mut b = join(&mut room, &mut rng);
        a.received();
        b.received();

        let position = Packet::Position { x: 1000, y: 1000 };
        assert!(!room.handle_packet(a.identity, position, &filters()));

        assert!(b.received().is_empty());
        assert_eq!(room.game.get(&a.identity).unwrap().position, a.attributes.position);
    }

    #[test]
    fn test_duplicate_identity_refused() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(6);
        let mut first = join(&mut room, &mut rng);
        first.received();

        let (tx, _rx) = mpsc::unbounded_channel();
        let addr = "127.0.0.1:9002".parse().unwrap();
        assert!(room.join(first.identity, addr, tx, &mut rng).is_none());
        assert_eq!(room.len(), 1);
        assert!(first.received().is_empty());
    }

    #[test]
    fn test_message_too_large_to_forward_is_dropped() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(8);
        let mut a = join(&mut room, &mut rng);
        let mut b = join(&mut room, &mut rng);
        a.received();
        b.received();

        let largest = "a".repeat(MAX_INBOUND_PAYLOAD_LEN as usize);
        assert!(room.handle_packet(a.identity, Packet::Message(largest.clone()), &filters()));
        assert_eq!(b.received(), vec![(a.identity, Packet::Message(largest))]);

        let oversized = "a".repeat(MAX_INBOUND_PAYLOAD_LEN as usize + 1);
        assert!(!room.handle_packet(a.identity, Packet::Message(oversized), &filters()));
        assert!(b.received().is_empty());
        assert!(room.contains(&a.identity));
    }

    #[test]
    fn test_leave_atomicity() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(5);
        let mut players: Vec<TestPlayer> = (0..3).map(|_| join(&mut room, &mut rng)).collect();
        for player in &mut players {
            player.received();
        }

        let leaving = players.pop().unwrap();
        assert!(room.leave(leaving.identity));

        assert!(!room.contains(&leaving.identity));
        assert!(room.game.get(&leaving.identity).is_none());

        for player in &mut players {
            assert_eq!(player.received(), vec![(leaving.identity, Packet::Leave)]);
        }

        let (x, y) = leaving.attributes.position;
        assert!(!room.handle_packet(leaving.identity, Packet::Position { x, y }, &filters()));
        assert!(!room.leave(leaving.identity));
        for player in &mut players {
            assert!(player.received().is_empty());
        }
    }

    #[test]
    fn test_players_never_overlap_after_random_moves() {
        let mut room = test_room();
        let mut rng = StdRng::seed_from_u64(6);
        let players: Vec<TestPlayer> = (0..10).map(|_| join(&mut room, &mut rng)).collect();
        let filters = filters();

        for _ in 0..2_000 {
            let mover = &players[rng.gen_range(0..players.len())];
            let x = rng.gen_range(0..800);
            let y = rng.gen_range(0..560);
            room.handle_packet(mover.identity, Packet::Position { x, y }, &filters);
        }

        let attributes: Vec<PlayerAttributes> = room.game.players().map(|(_, p)| *p).collect();
        let playfield = room.game.playfield();
        for i in 0..attributes.len() {
            assert!(playfield.contains(&attributes[i].rect()));
            for j in (i + 1)..attributes.len() {
                assert!(!check_collision(&attributes[i], &attributes[j]));
            }
        }
    }
}
