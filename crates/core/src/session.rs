//! Collaborator surface the engine drives: memory access, input injection, and world probes.
//! This module exists so every blocking call into the simulation crosses one trait boundary.
//! It does not own transport, framing, or emulator process management.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{DoorKind, StairKind};
use crate::types::*;

/// Failure reported by the external session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session transport failed: {0}")]
    Transport(String),
    #[error("address {address:#08x} is not readable or writable")]
    BadAddress { address: u32 },
    #[error("no collision data available for {0}")]
    NoCollisionData(RoomKey),
    #[error("no description available for {0}")]
    NoRoomDescription(RoomId),
    #[error("session is closed")]
    Closed,
}

/// Synchronous access to simulation memory.
pub trait MemoryBus {
    fn read_byte(&mut self, address: u32) -> Result<u8, SessionError>;
    fn read_word(&mut self, address: u32) -> Result<u16, SessionError>;
    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), SessionError>;
    fn write_word(&mut self, address: u32, value: u16) -> Result<(), SessionError>;
}

/// Read one value of `width` at `address`, widened to `u16`.
pub fn read_value<B: MemoryBus + ?Sized>(
    bus: &mut B,
    address: u32,
    width: ByteWidth,
) -> Result<u16, SessionError> {
    match width {
        ByteWidth::Byte => bus.read_byte(address).map(u16::from),
        ByteWidth::Word => bus.read_word(address),
    }
}

/// One external play session. Every call blocks until the simulation has handled it.
///
/// The engine never issues overlapping calls against the same session.
pub trait Session: MemoryBus {
    /// Hold `direction` for `frames` frames, then return.
    fn press_direction(&mut self, direction: Direction, frames: u32) -> Result<(), SessionError>;

    /// Hold `button` for `frames` frames, then return.
    fn press_button(&mut self, button: Button, frames: u32) -> Result<(), SessionError>;

    /// Advance `frames` frames with no input held.
    fn advance_frames(&mut self, frames: u32) -> Result<(), SessionError>;

    fn current_room_id(&mut self) -> Result<RoomId, SessionError>;

    /// Avatar position in room-local pixels.
    fn current_position(&mut self) -> Result<PixelPos, SessionError>;

    /// Overwrite one coordinate of the avatar's position in place.
    fn set_position_axis(&mut self, axis: Axis, value: i32) -> Result<(), SessionError>;

    fn fetch_collision_buffer(&mut self, key: RoomKey) -> Result<CollisionBuffer, SessionError>;

    fn fetch_room_description(&mut self, room: RoomId) -> Result<RoomDescription, SessionError>;
}

/// Bulk collision read for one room key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionBuffer {
    pub width: usize,
    pub height: usize,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Room-local pixel position of tile (0, 0).
    pub origin: PixelPos,
    pub tiles: Vec<TileCode>,
}

/// Exits of one room as the session reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDescription {
    pub doors: Vec<DoorSpec>,
    pub stairs: Vec<StairSpec>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSpec {
    pub to: RoomId,
    pub direction: Direction,
    pub kind: DoorKind,
    /// Tile offset of the door along the wall it sits in.
    pub offset: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StairSpec {
    pub to: RoomId,
    pub kind: StairKind,
}
