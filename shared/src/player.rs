/// Axis-aligned rectangle in playfield coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn get_bounds(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Whether two rectangles share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        let (x1, y1, x2, y2) = self.get_bounds();
        let (x3, y3, x4, y4) = other.get_bounds();

        !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        let (x1, y1, x2, y2) = self.get_bounds();
        let (x3, y3, x4, y4) = other.get_bounds();

        x1 <= x3 && y1 <= y3 && x4 <= x2 && y4 <= y2
    }
}

/// Authoritative description of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerAttributes {
    pub color: (u8, u8, u8),
    pub position: (u16, u16),
    pub size: (u8, u8),
}

impl PlayerAttributes {
    pub fn new(color: (u8, u8, u8), position: (u16, u16), size: (u8, u8)) -> Self {
        Self {
            color,
            position,
            size,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect_at(self.position.0, self.position.1)
    }

    /// The rectangle this player would occupy at `(x, y)`.
    pub fn rect_at(&self, x: u16, y: u16) -> Rect {
        Rect::new(
            i32::from(x),
            i32::from(y),
            i32::from(self.size.0),
            i32::from(self.size.1),
        )
    }
}

pub fn check_collision(player1: &PlayerAttributes, player2: &PlayerAttributes) -> bool {
    player1.rect().intersects(&player2.rect())
}
