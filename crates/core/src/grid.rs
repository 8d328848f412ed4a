//! Room collision data and the walkability queries built on it.
//! This module exists so pathfinding and path following see one fail-closed view of tiles.
//! It does not own search, room routing, or fetching policy beyond the per-room cache.

mod cache;
mod classify;

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::session::{CollisionBuffer, SessionError};
use crate::types::*;

pub use cache::GridCache;
pub use classify::{NavCategory, classify};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("collision buffer for {key} holds {actual} tiles, expected {expected}")]
    SizeMismatch { key: RoomKey, expected: usize, actual: usize },
    #[error("collision buffer for {key} has invalid geometry: {reason}")]
    InvalidGeometry { key: RoomKey, reason: String },
    #[error("grid was fetched for {fetched}, queried for {requested}")]
    WrongRoom { fetched: RoomKey, requested: RoomKey },
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Fixed-size tile buffer for one room key.
///
/// A grid is immutable once built; a room change produces a new grid rather than an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionGrid {
    key: RoomKey,
    width: usize,
    height: usize,
    tile_size: u32,
    origin: PixelPos,
    tiles: Vec<TileCode>,
    fingerprint: u64,
}

impl CollisionGrid {
    pub fn from_buffer(key: RoomKey, buffer: CollisionBuffer) -> Result<Self, GridError> {
        let CollisionBuffer { width, height, tile_size, origin, tiles } = buffer;
        if width == 0 || height == 0 {
            return Err(GridError::InvalidGeometry {
                key,
                reason: format!("{width}x{height} has no tiles"),
            });
        }
        if tile_size == 0 || i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(GridError::InvalidGeometry {
                key,
                reason: format!("{width}x{height} tiles of {tile_size}px is not addressable"),
            });
        }
        let expected = width * height;
        if tiles.len() != expected {
            return Err(GridError::SizeMismatch { key, expected, actual: tiles.len() });
        }

        let mut fingerprint_input = Vec::with_capacity(tiles.len() + 16);
        fingerprint_input.extend_from_slice(&(width as u64).to_le_bytes());
        fingerprint_input.extend_from_slice(&(height as u64).to_le_bytes());
        fingerprint_input.extend_from_slice(&tiles);
        let fingerprint = xxh3_64(&fingerprint_input);

        Ok(Self { key, width, height, tile_size, origin, tiles, fingerprint })
    }

    /// Build from row-major tile rows with origin at (0, 0). Rows must be equally long.
    pub fn from_rows(
        key: RoomKey,
        tile_size: u32,
        rows: &[Vec<TileCode>],
    ) -> Result<Self, GridError> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(GridError::InvalidGeometry {
                key,
                reason: format!("row {index} has {} tiles, row 0 has {width}", row.len()),
            });
        }
        let buffer = CollisionBuffer {
            width,
            height: rows.len(),
            tile_size,
            origin: PixelPos::default(),
            tiles: rows.concat(),
        };
        Self::from_buffer(key, buffer)
    }

    pub fn key(&self) -> RoomKey {
        self.key
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn origin(&self) -> PixelPos {
        self.origin
    }

    /// `xxh3` digest of the dimensions and tile codes.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Fails unless this grid was fetched for `key`.
    pub fn ensure_room(&self, key: RoomKey) -> Result<(), GridError> {
        if self.key != key {
            return Err(GridError::WrongRoom { fetched: self.key, requested: key });
        }
        Ok(())
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height
    }

    pub fn tile_at(&self, pos: GridPos) -> Option<TileCode> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.tiles[self.index(pos)])
    }

    /// Category of the tile at `pos`; out-of-bounds reads as solid.
    pub fn category_at(&self, pos: GridPos) -> NavCategory {
        self.tile_at(pos).map_or(NavCategory::Solid, classify)
    }

    pub fn is_walkable(&self, pos: GridPos, can_swim: bool) -> bool {
        self.category_at(pos).is_walkable(can_swim)
    }

    /// Walkable axis-aligned neighbors of `pos`, in north, south, west, east order.
    pub fn neighbors(&self, pos: GridPos, can_swim: bool) -> Vec<GridPos> {
        Direction::EXPANSION_ORDER
            .into_iter()
            .map(|dir| pos.step(dir))
            .filter(|next| self.is_walkable(*next, can_swim))
            .collect()
    }

    /// Tile containing a room-local pixel, if it lies on the grid.
    pub fn to_grid(&self, pixel: PixelPos) -> Option<GridPos> {
        let size = self.tile_size as i32;
        let pos = GridPos {
            x: (pixel.x - self.origin.x).div_euclid(size),
            y: (pixel.y - self.origin.y).div_euclid(size),
        };
        self.in_bounds(pos).then_some(pos)
    }

    /// Room-local pixel of the top-left corner of `pos`.
    pub fn to_pixel(&self, pos: GridPos) -> PixelPos {
        let size = self.tile_size as i32;
        PixelPos { x: self.origin.x + pos.x * size, y: self.origin.y + pos.y * size }
    }

    fn index(&self, pos: GridPos) -> usize {
        (pos.y as usize) * self.width + (pos.x as usize)
    }
}
