//! Fixed tile-code table. Every code maps to exactly one category; unlisted codes are solid.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, TileCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavCategory {
    Walkable,
    /// Deep water: passable only with the swim ability.
    Swimmable,
    Solid,
    /// One-way drop; the avatar may only leave the tile moving in this direction.
    Ledge(Direction),
    Hazard,
    /// Stairs, holes into other rooms, warp tiles.
    Warp,
    /// Buffer slot the session has not filled in.
    Unknown,
}

impl NavCategory {
    pub fn is_walkable(self, can_swim: bool) -> bool {
        match self {
            NavCategory::Walkable => true,
            NavCategory::Swimmable => can_swim,
            _ => false,
        }
    }
}

pub fn classify(code: TileCode) -> NavCategory {
    match code {
        // Floor, shallow water, grass, diggable ground, pressure plates.
        0x00 | 0x09 | 0x0A | 0x23 | 0x3A | 0x3B | 0x40 | 0x48 | 0x4E | 0x4F => {
            NavCategory::Walkable
        }
        0x08 => NavCategory::Swimmable,
        0x28 => NavCategory::Ledge(Direction::North),
        0x29 => NavCategory::Ledge(Direction::South),
        0x2A => NavCategory::Ledge(Direction::West),
        0x2B => NavCategory::Ledge(Direction::East),
        // Spikes, pits, conveyor-driven pits, ice ledges that kill.
        0x0C | 0x0D | 0x20 | 0x5D | 0x5E => NavCategory::Hazard,
        // Staircases, inter-room holes and warp tiles.
        0x1D | 0x1E | 0x1F | 0x22 | 0x3D | 0x3E | 0x3F | 0x4B => NavCategory::Warp,
        0xFF => NavCategory::Unknown,
        _ => NavCategory::Solid,
    }
}
