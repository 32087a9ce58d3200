//! Server-side packet filters.
//!
//! A filter looks at the sender, the packet and a read-only view of the game
//! state and answers whether the packet may be applied and forwarded. The
//! server requires every filter in its chain to accept a packet.

use log::debug;
use shared::{check_collision, Identity, Packet, PacketKind, Rect};

use crate::game::GameState;

pub type PacketFilter = Box<dyn Fn(Identity, &Packet, &GameState) -> bool + Send + Sync>;

/// Accepts only packets whose kind is in `kinds`.
pub fn whitelist_packets(kinds: &[PacketKind]) -> PacketFilter {
    let kinds = kinds.to_vec();
    Box::new(move |_: Identity, packet: &Packet, _: &GameState| kinds.contains(&packet.kind()))
}

/// Accepts position updates that keep the sender's rectangle inside the
/// given playfield. Other packets pass through.
pub fn position_filter(x: i32, y: i32, width: i32, height: i32) -> PacketFilter {
    let playfield = Rect::new(x, y, width, height);

    Box::new(move |identity: Identity, packet: &Packet, state: &GameState| {
        let Packet::Position { x, y } = *packet else {
            return true;
        };

        state
            .get(&identity)
            .map(|player| playfield.contains(&player.rect_at(x, y)))
            .unwrap_or(false)
    })
}

/// Accepts position updates that do not overlap any other player. Senders
/// without attributes are rejected. Other packets pass through.
pub fn player_collision_filter() -> PacketFilter {
    Box::new(|identity: Identity, packet: &Packet, state: &GameState| {
        let Packet::Position { x, y } = *packet else {
            return true;
        };

        let Some(player) = state.get(&identity) else {
            return false;
        };

        let mut moved = *player;
        moved.position = (x, y);

        !state.players().any(|(other_identity, other)| {
            *other_identity != identity && check_collision(&moved, other)
        })
    })
}

/// The chain used by the server: kind whitelist, playfield bounds, collisions.
pub fn default_filters(bounds: (u16, u16)) -> Vec<PacketFilter> {
    vec![
        whitelist_packets(&[PacketKind::Position, PacketKind::Message]),
        position_filter(0, 0, i32::from(bounds.0), i32::from(bounds.1)),
        player_collision_filter(),
    ]
}

/// Runs the chain in order, stopping at the first rejection.
pub fn accepts(
    filters: &[PacketFilter],
    identity: Identity,
    packet: &Packet,
    state: &GameState,
) -> bool {
    for (index, filter) in filters.iter().enumerate() {
        if !filter(identity, packet, state) {
            debug!("packet filtered by #{} ({}) {:?}", index, identity, packet);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{PlayerAttributes, DEFAULT_BOUNDS, PLAYER_SIZE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Builds a state with players placed at fixed positions.
    fn state_with(positions: &[(u16, u16)]) -> (GameState, Vec<Identity>) {
        let mut state = GameState::new(DEFAULT_BOUNDS, PLAYER_SIZE);
        let mut rng = StdRng::seed_from_u64(0);
        let mut identities = Vec::new();

        for &(x, y) in positions {
            let identity = Identity::generate();
            state.allocate(identity, &mut rng);
            state.apply_position(identity, x, y);
            identities.push(identity);
        }
        (state, identities)
    }

    #[test]
    fn test_whitelist() {
        let (state, ids) = state_with(&[(0, 0)]);
        let filter = whitelist_packets(&[PacketKind::Position]);

        assert!(filter(ids[0], &Packet::Position { x: 1, y: 1 }, &state));
        assert!(!filter(ids[0], &Packet::Leave, &state));

        let join = Packet::Join(PlayerAttributes::new((1, 1, 1), (0, 0), PLAYER_SIZE));
        assert!(!filter(ids[0], &join, &state));
        assert!(!filter(ids[0], &Packet::Leave.embed(ids[0]), &state));
    }

    #[test]
    fn test_position_filter_bounds() {
        let (state, ids) = state_with(&[(0, 0)]);
        let filter = position_filter(0, 0, 720, 480);

        assert!(filter(ids[0], &Packet::Position { x: 0, y: 0 }, &state));
        assert!(filter(ids[0], &Packet::Position { x: 688, y: 448 }, &state));
        assert!(!filter(ids[0], &Packet::Position { x: 689, y: 448 }, &state));
        assert!(!filter(ids[0], &Packet::Position { x: 688, y: 449 }, &state));
        assert!(!filter(ids[0], &Packet::Position { x: 1000, y: 1000 }, &state));
        assert!(!filter(ids[0], &Packet::Position { x: u16::MAX, y: u16::MAX }, &state));
    }

    #[test]
    fn test_position_filter_ignores_other_packets() {
        let (state, _) = state_with(&[]);
        let filter = position_filter(0, 0, 720, 480);
        assert!(filter(Identity::generate(), &Packet::Message("hi".into()), &state));
    }

    #[test]
    fn test_position_filter_unknown_sender() {
        let (state, _) = state_with(&[]);
        let filter = position_filter(0, 0, 720, 480);
        assert!(!filter(Identity::generate(), &Packet::Position { x: 0, y: 0 }, &state));
    }

    #[test]
    fn test_collision_filter() {
        let (state, ids) = state_with(&[(0, 0), (100, 100)]);
        let filter = player_collision_filter();

        assert!(!filter(ids[0], &Packet::Position { x: 90, y: 90 }, &state));
        assert!(!filter(ids[0], &Packet::Position { x: 131, y: 131 }, &state));
        assert!(filter(ids[0], &Packet::Position { x: 132, y: 100 }, &state));
        assert!(filter(ids[0], &Packet::Position { x: 68, y: 100 }, &state));
        assert!(filter(ids[0], &Packet::Position { x: 300, y: 300 }, &state));
    }

    #[test]
    fn test_collision_filter_ignores_own_rectangle() {
        let (state, ids) = state_with(&[(10, 10)]);
        let filter = player_collision_filter();
        assert!(filter(ids[0], &Packet::Position { x: 12, y: 12 }, &state));
    }

    #[test]
    fn test_collision_filter_fails_closed() {
        let (state, _) = state_with(&[(0, 0)]);
        let filter = player_collision_filter();
        assert!(!filter(Identity::generate(), &Packet::Position { x: 300, y: 300 }, &state));
    }

    #[test]
    fn test_chain_requires_all() {
        let (state, ids) = state_with(&[(0, 0), (100, 100)]);
        let filters = default_filters(DEFAULT_BOUNDS);

        assert!(accepts(&filters, ids[0], &Packet::Position { x: 200, y: 200 }, &state));
        assert!(accepts(&filters, ids[0], &Packet::Message("hello".into()), &state));
        assert!(!accepts(&filters, ids[0], &Packet::Position { x: 1000, y: 1000 }, &state));
        assert!(!accepts(&filters, ids[0], &Packet::Position { x: 110, y: 110 }, &state));
        assert!(!accepts(&filters, ids[0], &Packet::Leave, &state));
    }

    #[test]
    fn test_chain_short_circuits() {
        let (state, ids) = state_with(&[(0, 0)]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let filters: Vec<PacketFilter> = vec![
            Box::new(|_: Identity, _: &Packet, _: &GameState| false),
            Box::new(move |_: Identity, _: &Packet, _: &GameState| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        ];

        assert!(!accepts(&filters, ids[0], &Packet::Leave, &state));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
