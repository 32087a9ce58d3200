use log::{debug, info};
use rand::Rng;
use shared::{check_collision, Identity, PlayerAttributes, Rect};
use std::collections::HashMap;

/// Authoritative attributes of every joined player.
#[derive(Debug, Clone)]
pub struct GameState {
    players: HashMap<Identity, PlayerAttributes>,
    bounds: (u16, u16),
    player_size: (u8, u8),
}

impl GameState {
    pub fn new(bounds: (u16, u16), player_size: (u8, u8)) -> Self {
        Self {
            players: HashMap::new(),
            bounds,
            player_size,
        }
    }

    /// Places a new player at a random position that overlaps nobody and
    /// gives it a random color.
    ///
    /// Sampling retries until a free spot is found; callers keep the room
    /// below [`GameState::capacity`] so this terminates quickly.
    pub fn allocate<R: Rng>(&mut self, identity: Identity, rng: &mut R) -> PlayerAttributes {
        let max_x = self.bounds.0.saturating_sub(u16::from(self.player_size.0));
        let max_y = self.bounds.1.saturating_sub(u16::from(self.player_size.1));

        let mut attempts = 0u32;
        let position = loop {
            attempts += 1;
            let candidate = PlayerAttributes::new(
                (0, 0, 0),
                (rng.gen_range(0..=max_x), rng.gen_range(0..=max_y)),
                self.player_size,
            );

            if !self
                .players
                .values()
                .any(|other| check_collision(&candidate, other))
            {
                break candidate.position;
            }
        };

        let color = (
            rng.gen_range(64..=255),
            rng.gen_range(64..=255),
            rng.gen_range(64..=255),
        );
        let attributes = PlayerAttributes::new(color, position, self.player_size);

        info!(
            "Added player {} at ({}, {}) after {} attempts",
            identity, position.0, position.1, attempts
        );
        self.players.insert(identity, attributes);
        attributes
    }

    /// Moves a player. Filters are expected to have validated the move.
    pub fn apply_position(&mut self, identity: Identity, x: u16, y: u16) -> bool {
        match self.players.get_mut(&identity) {
            Some(player) => {
                debug!(
                    "update player ({}) position ({}, {}) -> ({}, {})",
                    identity, player.position.0, player.position.1, x, y
                );
                player.position = (x, y);
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self, identity: &Identity) -> Option<PlayerAttributes> {
        let removed = self.players.remove(identity);
        if removed.is_some() {
            info!("Removed player {}", identity);
        }
        removed
    }

    pub fn get(&self, identity: &Identity) -> Option<&PlayerAttributes> {
        self.players.get(identity)
    }

    pub fn players(&self) -> impl Iterator<Item = (&Identity, &PlayerAttributes)> {
        self.players.iter()
    }

    pub fn playfield(&self) -> Rect {
        Rect::new(0, 0, i32::from(self.bounds.0), i32::from(self.bounds.1))
    }

    /// Number of players the playfield can host while keeping random spawn
    /// placement cheap: a quarter of the player-sized cells.
    pub fn capacity(&self) -> usize {
        let columns = self.bounds.0 as usize / usize::from(self.player_size.0.max(1));
        let rows = self.bounds.1 as usize / usize::from(self.player_size.1.max(1));
        (columns * rows / 4).max(1)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
