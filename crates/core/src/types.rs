use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw 8-bit value from the simulation's collision buffer.
pub type TileCode = u8;

/// Width of a memory value the engine reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteWidth {
    Byte,
    Word,
}

impl ByteWidth {
    /// Largest value representable at this width.
    pub fn max_value(self) -> u16 {
        match self {
            ByteWidth::Byte => u16::from(u8::MAX),
            ByteWidth::Word => u16::MAX,
        }
    }
}

/// Grid-local tile coordinate. `y` grows southward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn manhattan(self, other: GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Direction of a single axis-aligned step from `self` to `next`, if they are adjacent.
    pub fn direction_to(self, next: GridPos) -> Option<Direction> {
        Direction::EXPANSION_ORDER.into_iter().find(|dir| self.step(*dir) == next)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Room-local pixel coordinate of the avatar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: i32,
    pub y: i32,
}

impl PixelPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn along(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

impl fmt::Display for PixelPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}px, {}px)", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    /// Neighbor expansion order used by the pathfinder. Tie-broken routes depend on it.
    pub const EXPANSION_ORDER: [Direction; 4] =
        [Direction::North, Direction::South, Direction::West, Direction::East];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// The axis a door in this direction must be lined up on.
    ///
    /// North/south doors sit in a column (match `x`), east/west doors sit in a row (match `y`).
    pub fn alignment_axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::X,
            Direction::West | Direction::East => Axis::Y,
        }
    }

    /// Direction that moves the avatar toward larger values on `axis` when `positive`.
    pub fn along(axis: Axis, positive: bool) -> Self {
        match (axis, positive) {
            (Axis::X, true) => Direction::East,
            (Axis::X, false) => Direction::West,
            (Axis::Y, true) => Direction::South,
            (Axis::Y, false) => Direction::North,
        }
    }
}

/// Identifier of one room/screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u16);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room {:#05x}", self.0)
    }
}

/// Key a collision buffer is fetched under: the room plus the active layer within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    pub room: RoomId,
    pub layer: u8,
}

impl RoomKey {
    pub const fn new(room: RoomId, layer: u8) -> Self {
        Self { room, layer }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} layer {}", self.room, self.layer)
    }
}

/// Identifier of the entrance a play session started from. Room graphs are scoped to one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntranceId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    A,
    B,
    X,
    Y,
    L,
    R,
    Start,
    Select,
}

/// One executable planning unit: hold `direction` for `tiles` tiles of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    pub direction: Direction,
    pub tiles: u32,
}

impl MoveInput {
    pub fn frames(&self, frames_per_tile: u32) -> u32 {
        self.tiles.saturating_mul(frames_per_tile)
    }
}
